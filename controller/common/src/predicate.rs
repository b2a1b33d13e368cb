//! Filters deciding which watch notifications are worth a reconciliation.

use crate::api::EdgeObject;
use crate::watch::Notification;
use tracing::{trace, warn};

/// Drops the update produced by the controller itself when it marks an
/// object as added to the edge platform. Everything else is admitted.
#[derive(Debug, Clone, Copy)]
pub struct FirstUpdateFilter {
    kind: &'static str,
}

impl FirstUpdateFilter {
    pub fn new(kind: &'static str) -> Self {
        FirstUpdateFilter { kind }
    }

    pub fn admit<K: EdgeObject>(&self, notification: &Notification<K>) -> bool {
        let (old, new) = match notification {
            Notification::Update { old, new } => (old, new),
            Notification::Create(_) | Notification::Delete(_) => return true,
        };
        match (old.added_to_edge(), new.added_to_edge()) {
            (Some(false), Some(true)) => {
                trace!(kind = self.kind, "Skip update of object newly added to edge platform");
                false
            }
            (Some(_), Some(_)) => true,
            _ => {
                warn!(kind = self.kind, "Fail to classify object, admitting update");
                true
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::device::{AdminState, DeviceSpec, DeviceStatus};
    use crate::api::Device;
    use kube::core::{DynamicObject, TypeMeta};

    fn device(synced: bool, admin: AdminState) -> Device {
        let mut dev = Device::new(
            "boiler",
            DeviceSpec {
                admin_state: Some(admin),
                ..Default::default()
            },
        );
        dev.status = Some(DeviceStatus {
            synced,
            ..Default::default()
        });
        dev
    }

    #[test]
    fn suppresses_only_the_synced_transition() {
        let filter = FirstUpdateFilter::new("device");
        let registered = Notification::Update {
            old: device(false, AdminState::Unlocked),
            new: device(true, AdminState::Unlocked),
        };
        assert!(!filter.admit(&registered));

        let admin_changed = Notification::Update {
            old: device(true, AdminState::Unlocked),
            new: device(true, AdminState::Locked),
        };
        assert!(filter.admit(&admin_changed));

        let unsynced = Notification::Update {
            old: device(true, AdminState::Unlocked),
            new: device(false, AdminState::Unlocked),
        };
        assert!(filter.admit(&unsynced));
    }

    #[test]
    fn creates_and_deletes_are_admitted() {
        let filter = FirstUpdateFilter::new("device");
        assert!(filter.admit(&Notification::Create(device(true, AdminState::Locked))));
        assert!(filter.admit(&Notification::Delete(device(false, AdminState::Locked))));
    }

    #[test]
    fn unknown_kind_fails_open() {
        let filter = FirstUpdateFilter::new("deviceprofile");
        let obj = |synced: bool| DynamicObject {
            types: Some(TypeMeta {
                api_version: "v1".to_owned(),
                kind: "ConfigMap".to_owned(),
            }),
            metadata: Default::default(),
            data: serde_json::json!({ "status": { "synced": synced } }),
        };
        assert!(filter.admit(&Notification::Update {
            old: obj(false),
            new: obj(true),
        }));
    }
}
