use crate::oracle::{OracleEvaluator, OracleVerdict};
use curio_core::error::CurioError;
use curio_core::id::CurioAddress;
use curio_core::operation::OperationKind;
use curio_core::plugins::{LifecycleEvent, Plugin, PluginRuling};
use curio_core::records::{AssetRecord, CollectionRecord};
use log::debug;

/// The single authorization decision point for asset operations.
///
/// Evaluation order is fixed and enforced here, nowhere else:
///
/// 1. freeze veto — unconditional, owner included
/// 2. oracle checks — a rejection overrides owner consent
/// 3. delegate grants — permit without an owner/authority match
/// 4. owner (transfer/burn) or effective update authority (mutations)
///
/// Plugins attached to the parent collection participate for every asset
/// inside it. Deny reasons name the vetoing plugin or oracle.
pub fn authorize_asset_op(
    op: OperationKind,
    asset: &AssetRecord,
    collection: Option<&CollectionRecord>,
    caller: &CurioAddress,
    oracle: &dyn OracleEvaluator,
) -> Result<(), CurioError> {
    match op {
        OperationKind::Create => Ok(()),
        OperationKind::Transfer | OperationKind::Burn => {
            let event = match op {
                OperationKind::Transfer => LifecycleEvent::Transfer,
                _ => LifecycleEvent::Burn,
            };

            // 1. Unconditional vetoes first: a frozen asset stays put no
            // matter who asks.
            for plugin in attached_plugins(asset, collection) {
                if let PluginRuling::Deny(reason) = plugin.ruling(op, caller) {
                    debug!("{} denied on {}: {}", describe(op), asset.address, reason);
                    return Err(CurioError::Unauthorized(reason.to_string()));
                }
            }

            // 2. Oracle checks next, so a cooperative owner cannot bypass
            // an external rule.
            check_oracles(event, asset, collection, oracle)?;

            // 3. Delegate grants.
            for plugin in attached_plugins(asset, collection) {
                if plugin.ruling(op, caller) == PluginRuling::Permit {
                    debug!(
                        "{} on {} granted to delegate {}",
                        describe(op),
                        asset.address,
                        caller
                    );
                    return Ok(());
                }
            }

            // 4. Fall back to the owner.
            if caller == &asset.owner {
                Ok(())
            } else {
                Err(CurioError::Unauthorized(format!(
                    "caller {} is neither the owner nor a {} delegate",
                    caller,
                    describe(op)
                )))
            }
        }
        OperationKind::UpdateMetadata | OperationKind::PluginMutate => {
            check_oracles(LifecycleEvent::Update, asset, collection, oracle)?;

            // Collection-governed assets inherit the collection's authority.
            let effective = match collection {
                Some(coll) => Some(coll.update_authority),
                None => asset.update_authority,
            };
            match effective {
                Some(authority) if &authority == caller => Ok(()),
                Some(_) => Err(CurioError::Unauthorized(format!(
                    "caller {} does not hold the update authority",
                    caller
                ))),
                None => Err(CurioError::Unauthorized(
                    "asset has no update authority and is immutable".to_string(),
                )),
            }
        }
    }
}

/// Authorization for operations on a collection record itself: only the
/// collection's update authority mutates it.
pub fn authorize_collection_op(
    collection: &CollectionRecord,
    caller: &CurioAddress,
) -> Result<(), CurioError> {
    if caller == &collection.update_authority {
        Ok(())
    } else {
        Err(CurioError::Unauthorized(format!(
            "caller {} does not hold the collection's update authority",
            caller
        )))
    }
}

fn attached_plugins<'a>(
    asset: &'a AssetRecord,
    collection: Option<&'a CollectionRecord>,
) -> impl Iterator<Item = &'a Plugin> {
    asset
        .plugins
        .iter()
        .chain(collection.into_iter().flat_map(|c| c.plugins.iter()))
}

fn check_oracles(
    event: LifecycleEvent,
    asset: &AssetRecord,
    collection: Option<&CollectionRecord>,
    oracle: &dyn OracleEvaluator,
) -> Result<(), CurioError> {
    let configs = asset.plugins.oracles_for(event).chain(
        collection
            .into_iter()
            .flat_map(move |c| c.plugins.oracles_for(event)),
    );
    for config in configs {
        if oracle.evaluate(&config.base_address, event, &asset.address)? == OracleVerdict::Reject {
            return Err(CurioError::Unauthorized(format!(
                "oracle {} rejected {:?}",
                config.base_address, event
            )));
        }
    }
    Ok(())
}

fn describe(op: OperationKind) -> &'static str {
    match op {
        OperationKind::Create => "create",
        OperationKind::Transfer => "transfer",
        OperationKind::Burn => "burn",
        OperationKind::UpdateMetadata => "update",
        OperationKind::PluginMutate => "plugin mutation",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::TableOracle;
    use curio_core::plugins::OracleConfig;

    fn addr(byte: u8) -> CurioAddress {
        CurioAddress::new([byte; 32])
    }

    fn plain_asset(owner: CurioAddress, plugins: Vec<Plugin>) -> AssetRecord {
        AssetRecord::new(
            addr(10),
            "Asset".to_string(),
            "uri".to_string(),
            owner,
            None,
            None,
            plugins,
        )
        .unwrap()
    }

    fn governed_asset(owner: CurioAddress, collection: CurioAddress) -> AssetRecord {
        AssetRecord::new(
            addr(10),
            "Asset".to_string(),
            "uri".to_string(),
            owner,
            None,
            Some(collection),
            vec![],
        )
        .unwrap()
    }

    fn collection(authority: CurioAddress, plugins: Vec<Plugin>) -> CollectionRecord {
        CollectionRecord::new(
            addr(20),
            "Collection".to_string(),
            "uri".to_string(),
            authority,
            plugins,
        )
        .unwrap()
    }

    #[test]
    fn test_owner_transfers_unencumbered_asset() {
        let owner = addr(1);
        let asset = plain_asset(owner, vec![]);
        let oracle = TableOracle::new();
        assert!(
            authorize_asset_op(OperationKind::Transfer, &asset, None, &owner, &oracle).is_ok()
        );
    }

    #[test]
    fn test_stranger_cannot_transfer() {
        let asset = plain_asset(addr(1), vec![]);
        let oracle = TableOracle::new();
        let err =
            authorize_asset_op(OperationKind::Transfer, &asset, None, &addr(2), &oracle)
                .unwrap_err();
        assert!(matches!(err, CurioError::Unauthorized(_)));
    }

    #[test]
    fn test_permanent_freeze_vetoes_owner() {
        let owner = addr(1);
        let asset = plain_asset(owner, vec![Plugin::PermanentFreezeDelegate { frozen: true }]);
        let oracle = TableOracle::new();

        for op in [OperationKind::Transfer, OperationKind::Burn] {
            let err = authorize_asset_op(op, &asset, None, &owner, &oracle).unwrap_err();
            match err {
                CurioError::Unauthorized(reason) => {
                    assert!(reason.contains("PermanentFreezeDelegate"))
                }
                other => panic!("expected Unauthorized, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_collection_freeze_gates_member_assets() {
        let owner = addr(1);
        let coll = collection(
            addr(3),
            vec![Plugin::PermanentFreezeDelegate { frozen: true }],
        );
        let asset = governed_asset(owner, coll.address);
        let oracle = TableOracle::new();

        let err = authorize_asset_op(
            OperationKind::Transfer,
            &asset,
            Some(&coll),
            &owner,
            &oracle,
        )
        .unwrap_err();
        assert!(matches!(err, CurioError::Unauthorized(_)));
    }

    #[test]
    fn test_freeze_veto_beats_delegate_grant() {
        let delegate = addr(5);
        let asset = plain_asset(
            addr(1),
            vec![
                Plugin::PermanentTransferDelegate { delegate },
                Plugin::PermanentFreezeDelegate { frozen: true },
            ],
        );
        let oracle = TableOracle::new();

        // Even the permanent delegate cannot move a frozen asset
        let err = authorize_asset_op(OperationKind::Transfer, &asset, None, &delegate, &oracle)
            .unwrap_err();
        assert!(matches!(err, CurioError::Unauthorized(_)));
    }

    #[test]
    fn test_permanent_transfer_delegate_overrides_owner_mismatch() {
        let delegate = addr(5);
        let asset = plain_asset(addr(1), vec![Plugin::PermanentTransferDelegate { delegate }]);
        let oracle = TableOracle::new();

        assert!(authorize_asset_op(OperationKind::Transfer, &asset, None, &delegate, &oracle)
            .is_ok());
        // The delegate holds transfer rights, not burn rights
        let err = authorize_asset_op(OperationKind::Burn, &asset, None, &delegate, &oracle)
            .unwrap_err();
        assert!(matches!(err, CurioError::Unauthorized(_)));
    }

    #[test]
    fn test_permanent_burn_delegate_burns_without_ownership() {
        let delegate = addr(5);
        let asset = plain_asset(addr(1), vec![Plugin::PermanentBurnDelegate { delegate }]);
        let oracle = TableOracle::new();
        assert!(authorize_asset_op(OperationKind::Burn, &asset, None, &delegate, &oracle).is_ok());
    }

    #[test]
    fn test_oracle_rejection_overrides_owner_consent() {
        let owner = addr(1);
        let oracle_account = addr(7);
        let asset = plain_asset(
            owner,
            vec![Plugin::Oracle(OracleConfig {
                base_address: oracle_account,
                checks: vec![LifecycleEvent::Transfer],
            })],
        );

        let oracle = TableOracle::new();
        oracle.set(oracle_account, LifecycleEvent::Transfer, OracleVerdict::Reject);

        let err = authorize_asset_op(OperationKind::Transfer, &asset, None, &owner, &oracle)
            .unwrap_err();
        match err {
            CurioError::Unauthorized(reason) => assert!(reason.contains("oracle")),
            other => panic!("expected Unauthorized, got {:?}", other),
        }

        // The oracle only gates the events it registered for
        assert!(authorize_asset_op(OperationKind::Burn, &asset, None, &owner, &oracle).is_ok());
    }

    #[test]
    fn test_update_requires_effective_authority() {
        let authority = addr(3);
        let coll = collection(authority, vec![]);
        let asset = governed_asset(addr(1), coll.address);
        let oracle = TableOracle::new();

        // The collection's authority governs its assets
        assert!(authorize_asset_op(
            OperationKind::UpdateMetadata,
            &asset,
            Some(&coll),
            &authority,
            &oracle
        )
        .is_ok());

        // The owner is not the authority here
        let err = authorize_asset_op(
            OperationKind::UpdateMetadata,
            &asset,
            Some(&coll),
            &addr(1),
            &oracle,
        )
        .unwrap_err();
        assert!(matches!(err, CurioError::Unauthorized(_)));
    }

    #[test]
    fn test_asset_without_authority_is_immutable() {
        let asset = plain_asset(addr(1), vec![]);
        let oracle = TableOracle::new();
        let err = authorize_asset_op(OperationKind::UpdateMetadata, &asset, None, &addr(1), &oracle)
            .unwrap_err();
        match err {
            CurioError::Unauthorized(reason) => assert!(reason.contains("immutable")),
            other => panic!("expected Unauthorized, got {:?}", other),
        }
    }

    #[test]
    fn test_collection_op_requires_collection_authority() {
        let coll = collection(addr(3), vec![]);
        assert!(authorize_collection_op(&coll, &addr(3)).is_ok());
        assert!(matches!(
            authorize_collection_op(&coll, &addr(4)),
            Err(CurioError::Unauthorized(_))
        ));
    }
}
