//! Mapping of descriptor disks and NICs onto datastores and networks.

use serde::{Deserialize, Serialize};

use crate::item::StorageBacking;

/// Datastore ID placeholder for values not yet known.
const COMPUTED: &str = "<computed>";

/// Requested placement for one disk named in the descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DiskPlacement {
    pub ovf_mapping: String,
    #[serde(default)]
    pub datastore_id: Option<String>,
    #[serde(default)]
    pub storage_policy_id: Option<String>,
}

/// Requested network for one NIC named in the descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NicPlacement {
    pub ovf_mapping: String,
    pub network_id: String,
}

/// Item-level fallbacks used when a disk leaves a field unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementDefaults {
    pub datastore_id: String,
    pub storage_policy_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageGroupMapping {
    #[serde(rename = "type")]
    pub mapping_type: String,
    pub datastore_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub storage_profile_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageMapping {
    pub key: String,
    pub value: StorageGroupMapping,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkMapping {
    pub key: String,
    pub value: String,
}

pub fn map_storage_devices(
    disks: &[DiskPlacement],
    defaults: &PlacementDefaults,
) -> Vec<StorageMapping> {
    disks
        .iter()
        .map(|disk| {
            let datastore_id = match disk.datastore_id.as_deref() {
                None | Some("") | Some(COMPUTED) => defaults.datastore_id.clone(),
                Some(id) => id.to_owned(),
            };
            let storage_profile_id = match disk.storage_policy_id.as_deref() {
                None | Some("") => defaults.storage_policy_id.clone(),
                Some(id) => id.to_owned(),
            };
            StorageMapping {
                key: disk.ovf_mapping.clone(),
                value: StorageGroupMapping {
                    mapping_type: StorageBacking::DATASTORE.to_owned(),
                    datastore_id,
                    storage_profile_id,
                },
            }
        })
        .collect()
}

pub fn map_network_devices(nics: &[NicPlacement]) -> Vec<NetworkMapping> {
    nics.iter()
        .map(|nic| NetworkMapping {
            key: nic.ovf_mapping.clone(),
            value: nic.network_id.clone(),
        })
        .collect()
}

/// Datastore IDs to library storage backings.
pub fn expand_storage_backings<I, S>(datastore_ids: I) -> Vec<StorageBacking>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    datastore_ids
        .into_iter()
        .map(StorageBacking::datastore)
        .collect()
}

/// Library storage backings back to datastore IDs. Non-datastore backings are dropped.
pub fn flatten_storage_backings(backings: &[StorageBacking]) -> Vec<String> {
    backings
        .iter()
        .filter(|b| b.backing_type == StorageBacking::DATASTORE)
        .map(|b| b.datastore_id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> PlacementDefaults {
        PlacementDefaults {
            datastore_id: "datastore-1".into(),
            storage_policy_id: "policy-gold".into(),
        }
    }

    #[test]
    fn unset_disk_fields_fall_back_to_defaults() {
        let disks = vec![
            DiskPlacement {
                ovf_mapping: "disk-0".into(),
                ..DiskPlacement::default()
            },
            DiskPlacement {
                ovf_mapping: "disk-1".into(),
                datastore_id: Some("<computed>".into()),
                storage_policy_id: Some(String::new()),
            },
        ];

        for mapping in map_storage_devices(&disks, &defaults()) {
            assert_eq!(mapping.value.datastore_id, "datastore-1");
            assert_eq!(mapping.value.storage_profile_id, "policy-gold");
            assert_eq!(mapping.value.mapping_type, "DATASTORE");
        }
    }

    #[test]
    fn explicit_disk_fields_win() {
        let disks = vec![DiskPlacement {
            ovf_mapping: "disk-0".into(),
            datastore_id: Some("datastore-9".into()),
            storage_policy_id: Some("policy-bronze".into()),
        }];

        let mapping = &map_storage_devices(&disks, &defaults())[0];
        assert_eq!(mapping.key, "disk-0");
        assert_eq!(mapping.value.datastore_id, "datastore-9");
        assert_eq!(mapping.value.storage_profile_id, "policy-bronze");
    }

    #[test]
    fn nics_map_to_networks_in_order() {
        let nics = vec![
            NicPlacement {
                ovf_mapping: "VM Network".into(),
                network_id: "network-11".into(),
            },
            NicPlacement {
                ovf_mapping: "Storage".into(),
                network_id: "dvportgroup-7".into(),
            },
        ];
        let mapped = map_network_devices(&nics);
        assert_eq!(mapped[0].key, "VM Network");
        assert_eq!(mapped[1].value, "dvportgroup-7");
    }

    #[test]
    fn backings_expand_and_flatten() {
        let mut backings = expand_storage_backings(["datastore-1", "datastore-2"]);
        backings.push(StorageBacking {
            backing_type: "OTHER".into(),
            datastore_id: String::new(),
        });
        assert_eq!(
            flatten_storage_backings(&backings),
            vec!["datastore-1".to_owned(), "datastore-2".to_owned()]
        );
    }
}
