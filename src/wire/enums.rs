//! Wire enumerations.
//!
//! Every enum carries a canonical string form. An unrecognised wire value
//! decodes to the `Invalid` variant rather than failing `decode()` — the
//! failure is deferred to first use (`InvalidPayload`), per spec §4.1.

use serde::{Deserialize, Serialize};

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $variant:ident => $wire:literal ),+ $(,)?
            ; invalid = $invalid:ident
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $variant, )+
            $invalid,
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $wire, )+
                    Self::$invalid => "INVALID",
                }
            }

            pub fn is_valid(&self) -> bool {
                !matches!(self, Self::$invalid)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$invalid
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                s.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(d: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(d)?;
                Ok(match s.as_str() {
                    $( $wire => Self::$variant, )+
                    _ => Self::$invalid,
                })
            }
        }
    };
}

wire_enum! {
    pub enum ByeReason {
        Error => "ERROR",
        SystemError => "SYSTEM_ERROR",
        InvalidUser => "INVALID_USER",
        AuthFailure => "AUTH_FAILURE",
        ConnConflict => "CONN_CONFLICT",
        Reconnect => "RECONNECT",
        Shutdown => "SHUTDOWN",
        Deleted => "DELETED",
        ConnClose => "CONN_CLOSE",
        ; invalid = Invalid
    }
}

/// Recovery class a [`ByeReason`] maps to, per spec §4.3 / §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByeRecovery {
    /// Reconnect after `retry` seconds.
    Recoverable,
    /// Terminal; purge persisted session/credentials.
    FatalForget,
    /// Terminal; surface to the embedder, no purge.
    FatalReport,
}

impl ByeReason {
    pub fn recovery(&self) -> ByeRecovery {
        match self {
            ByeReason::Reconnect | ByeReason::ConnClose | ByeReason::Shutdown => {
                ByeRecovery::Recoverable
            }
            ByeReason::Deleted => ByeRecovery::FatalForget,
            ByeReason::AuthFailure
            | ByeReason::InvalidUser
            | ByeReason::ConnConflict
            | ByeReason::SystemError
            | ByeReason::Error => ByeRecovery::FatalReport,
            ByeReason::Invalid => ByeRecovery::FatalReport,
        }
    }
}

wire_enum! {
    pub enum DoneStatus {
        Ok => "OK",
        CmError => "CM_ERROR",
        SystemError => "SYSTEM_ERROR",
        NotSupported => "NOT_SUPPORTED",
        InvalidParam => "INVALID_PARAM",
        MissedParam => "MISSED_PARAM",
        TooMany => "TOO_MANY",
        Retry => "RETRY",
        ; invalid = Invalid
    }
}

wire_enum! {
    pub enum StreamReason {
        Record => "record",
        RecordByEvent => "record_by_event",
        Live => "live",
        ; invalid = Invalid
    }
}

wire_enum! {
    pub enum EventType {
        Motion => "motion",
        AudioDetection => "audio_detection",
        Tampering => "tampering",
        Online => "online",
        Offline => "offline",
        StorageFailure => "storage_failure",
        Custom => "custom",
        ; invalid = Invalid
    }
}

wire_enum! {
    pub enum UploadCategory {
        Record => "record",
        Snapshot => "snapshot",
        FileMeta => "file_meta",
        ; invalid = Invalid
    }
}

wire_enum! {
    pub enum MediaType {
        Mp4 => "mp4",
        Jpg => "jpg",
        ; invalid = Invalid
    }
}

wire_enum! {
    pub enum SyncStatus {
        Pending => "PENDING",
        Done => "DONE",
        Error => "ERROR",
        Canceled => "CANCELED",
        TooManyRequests => "TOO_MANY_REQUESTS",
        ; invalid = Invalid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_wire_value_is_invalid_not_an_error() {
        let v: ByeReason = serde_json::from_str("\"NOT_A_REASON\"").unwrap();
        assert_eq!(v, ByeReason::Invalid);
        assert!(!v.is_valid());
    }

    #[test]
    fn round_trips_canonical_form() {
        let v = ByeReason::Reconnect;
        let s = serde_json::to_string(&v).unwrap();
        assert_eq!(s, "\"RECONNECT\"");
        let back: ByeReason = serde_json::from_str(&s).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn bye_reason_recovery_classes() {
        assert_eq!(ByeReason::Reconnect.recovery(), ByeRecovery::Recoverable);
        assert_eq!(ByeReason::Deleted.recovery(), ByeRecovery::FatalForget);
        assert_eq!(ByeReason::AuthFailure.recovery(), ByeRecovery::FatalReport);
    }
}
