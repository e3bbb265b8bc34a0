use crate::error::CurioError;
use crate::id::CurioAddress;
use crate::plugins::{Plugin, PluginSet};
use serde::{Deserialize, Serialize};

/// Supply bookkeeping carried by a master-edition collection. The live
/// print counter is owned by the edition registry; the record only declares
/// the cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterEditionInfo {
    pub max_supply: u32,
}

/// The back-reference a printed edition carries to its master collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditionTag {
    pub master: CurioAddress,
    /// Monotonically assigned, never reused, 1-based
    pub number: u32,
}

/// A single non-fungible record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub address: CurioAddress,
    pub name: String,
    pub uri: String,
    pub owner: CurioAddress,

    /// None means the asset is either collection-governed (authority is
    /// inherited from the parent collection) or, without a collection,
    /// immutable.
    pub update_authority: Option<CurioAddress>,

    /// Parent collection, if any
    pub collection: Option<CurioAddress>,

    pub plugins: PluginSet,

    /// Set when this asset is a printed edition of a master collection
    pub edition: Option<EditionTag>,
}

impl AssetRecord {
    pub fn new(
        address: CurioAddress,
        name: String,
        uri: String,
        owner: CurioAddress,
        update_authority: Option<CurioAddress>,
        collection: Option<CurioAddress>,
        plugins: Vec<Plugin>,
    ) -> Result<Self, CurioError> {
        let record = Self {
            address,
            name,
            uri,
            owner,
            update_authority,
            collection,
            plugins: PluginSet::try_from_plugins(plugins)?,
            edition: None,
        };
        record.validate()?;
        Ok(record)
    }

    /// Record invariants, re-checked by the store after every patch
    pub fn validate(&self) -> Result<(), CurioError> {
        // A collection-governed asset inherits its authority from the
        // collection and must not carry its own.
        if self.collection.is_some() && self.update_authority.is_some() {
            return Err(CurioError::InvalidState(
                "an asset in a collection cannot carry its own update authority".to_string(),
            ));
        }
        if let Some(tag) = &self.edition {
            if self.collection != Some(tag.master) {
                return Err(CurioError::InvalidState(
                    "an edition must belong to its master collection".to_string(),
                ));
            }
            if tag.number == 0 {
                return Err(CurioError::InvalidState(
                    "edition numbers are 1-based".to_string(),
                ));
            }
        }
        for plugin in self.plugins.iter() {
            plugin.validate()?;
        }
        Ok(())
    }
}

/// A grouping record that assets may reference; carries its own plugins and
/// a required update authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub address: CurioAddress,
    pub name: String,
    pub uri: String,
    pub update_authority: CurioAddress,
    pub plugins: PluginSet,

    /// Set when this collection is a supply-limited master edition
    pub master_edition: Option<MasterEditionInfo>,
}

impl CollectionRecord {
    pub fn new(
        address: CurioAddress,
        name: String,
        uri: String,
        update_authority: CurioAddress,
        plugins: Vec<Plugin>,
    ) -> Result<Self, CurioError> {
        let record = Self {
            address,
            name,
            uri,
            update_authority,
            plugins: PluginSet::try_from_plugins(plugins)?,
            master_edition: None,
        };
        record.validate()?;
        Ok(record)
    }

    pub fn validate(&self) -> Result<(), CurioError> {
        for plugin in self.plugins.iter() {
            plugin.validate()?;
        }
        Ok(())
    }
}

/// Unified record enum for everything the store holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurioRecord {
    Asset(AssetRecord),
    Collection(CollectionRecord),
}

impl CurioRecord {
    pub fn address(&self) -> &CurioAddress {
        match self {
            CurioRecord::Asset(a) => &a.address,
            CurioRecord::Collection(c) => &c.address,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CurioRecord::Asset(a) => &a.name,
            CurioRecord::Collection(c) => &c.name,
        }
    }

    pub fn uri(&self) -> &str {
        match self {
            CurioRecord::Asset(a) => &a.uri,
            CurioRecord::Collection(c) => &c.uri,
        }
    }

    pub fn plugins(&self) -> &PluginSet {
        match self {
            CurioRecord::Asset(a) => &a.plugins,
            CurioRecord::Collection(c) => &c.plugins,
        }
    }

    pub fn plugins_mut(&mut self) -> &mut PluginSet {
        match self {
            CurioRecord::Asset(a) => &mut a.plugins,
            CurioRecord::Collection(c) => &mut c.plugins,
        }
    }

    pub fn is_asset(&self) -> bool {
        matches!(self, CurioRecord::Asset(_))
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, CurioRecord::Collection(_))
    }

    pub fn as_asset(&self) -> Option<&AssetRecord> {
        match self {
            CurioRecord::Asset(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_asset_mut(&mut self) -> Option<&mut AssetRecord> {
        match self {
            CurioRecord::Asset(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&CollectionRecord> {
        match self {
            CurioRecord::Collection(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_collection_mut(&mut self) -> Option<&mut CollectionRecord> {
        match self {
            CurioRecord::Collection(c) => Some(c),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<(), CurioError> {
        match self {
            CurioRecord::Asset(a) => a.validate(),
            CurioRecord::Collection(c) => c.validate(),
        }
    }
}

impl From<AssetRecord> for CurioRecord {
    fn from(record: AssetRecord) -> Self {
        CurioRecord::Asset(record)
    }
}

impl From<CollectionRecord> for CurioRecord {
    fn from(record: CollectionRecord) -> Self {
        CurioRecord::Collection(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::{Autograph, Plugin};

    fn addr(byte: u8) -> CurioAddress {
        CurioAddress::new([byte; 32])
    }

    #[test]
    fn test_collection_governed_asset_rejects_own_authority() {
        let err = AssetRecord::new(
            addr(1),
            "Asset".to_string(),
            "https://example.com/asset.json".to_string(),
            addr(2),
            Some(addr(3)),
            Some(addr(4)),
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, CurioError::InvalidState(_)));
    }

    #[test]
    fn test_standalone_asset_may_carry_authority() {
        let asset = AssetRecord::new(
            addr(1),
            "Asset".to_string(),
            "https://example.com/asset.json".to_string(),
            addr(2),
            Some(addr(3)),
            None,
            vec![],
        )
        .unwrap();
        assert_eq!(asset.update_authority, Some(addr(3)));
    }

    #[test]
    fn test_edition_tag_must_match_collection() {
        let mut asset = AssetRecord::new(
            addr(1),
            "Print".to_string(),
            "https://example.com/print.json".to_string(),
            addr(2),
            None,
            Some(addr(4)),
            vec![],
        )
        .unwrap();

        asset.edition = Some(EditionTag {
            master: addr(5),
            number: 1,
        });
        assert!(asset.validate().is_err());

        asset.edition = Some(EditionTag {
            master: addr(4),
            number: 1,
        });
        assert!(asset.validate().is_ok());
    }

    #[test]
    fn test_record_accessors() {
        let asset: CurioRecord = AssetRecord::new(
            addr(1),
            "Asset".to_string(),
            "uri".to_string(),
            addr(2),
            None,
            None,
            vec![Plugin::Autograph(Autograph::default())],
        )
        .unwrap()
        .into();

        assert!(asset.is_asset());
        assert!(!asset.is_collection());
        assert_eq!(asset.address(), &addr(1));
        assert_eq!(asset.name(), "Asset");
        assert_eq!(asset.plugins().len(), 1);
        assert!(asset.as_collection().is_none());
    }

    #[test]
    fn test_creation_plugins_are_validated() {
        use crate::plugins::{Creator, Royalties};
        let err = AssetRecord::new(
            addr(1),
            "Asset".to_string(),
            "uri".to_string(),
            addr(2),
            None,
            None,
            vec![Plugin::Royalties(Royalties {
                basis_points: 250,
                creators: vec![Creator {
                    address: addr(9),
                    percentage: 99,
                }],
            })],
        )
        .unwrap_err();
        assert!(matches!(err, CurioError::InvalidPlugin(_)));
    }
}
