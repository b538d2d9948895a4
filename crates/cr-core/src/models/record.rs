use serde::Serialize;

/// The singleton directory entry naming the current cache-refresh owner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_address: Option<String>,
    pub enabled: bool,
    /// Tracked cache-refresh configuration value, re-written on hand-off.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_blob: Option<String>,
}

impl OwnershipRecord {
    /// Build a record from raw directory attribute values. Blank owner values
    /// count as no owner; the flag is on only for the literal `enabled`.
    pub fn from_attributes(
        owner: Option<&str>,
        enabled_flag: Option<&str>,
        config_blob: Option<&str>,
    ) -> Self {
        Self {
            owner_address: owner
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string),
            enabled: enabled_flag
                .map(|f| f.trim().eq_ignore_ascii_case("enabled"))
                .unwrap_or(false),
            config_blob: config_blob.map(str::to_string),
        }
    }
}

/// The directory server's structured answer to a modify request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryAck {
    pub code: u32,
    pub message: String,
}

impl DirectoryAck {
    pub fn success() -> Self {
        Self {
            code: 0,
            message: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}
