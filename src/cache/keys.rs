//! Cache key layout
//!
//! Countries are uppercased in every key so lookups are case-insensitive at
//! the edge.

use uuid::Uuid;

pub fn workflow_key(country_iso: &str, promotion_id: Uuid, version: i32) -> String {
    format!(
        "wf:{}:{}:v{}",
        country_iso.to_uppercase(),
        promotion_id,
        version
    )
}

pub fn manifest_key(country_iso: &str, promotion_id: Uuid, version: i32) -> String {
    format!(
        "wf:manifest:{}:{}:v{}",
        country_iso.to_uppercase(),
        promotion_id,
        version
    )
}

pub fn index_key(country_iso: &str) -> String {
    format!("wf:index:{}", country_iso.to_uppercase())
}

pub fn active_key(country_iso: &str) -> String {
    format!("wf:active:{}", country_iso.to_uppercase())
}

pub fn metadata_key(promotion_id: Uuid) -> String {
    format!("wf:metadata:{}", promotion_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let id: Uuid = "0191d8a2-0000-7000-8000-000000000001".parse().unwrap();
        assert_eq!(
            workflow_key("es", id, 3),
            format!("wf:ES:{}:v3", id)
        );
        assert_eq!(
            manifest_key("ES", id, 3),
            format!("wf:manifest:ES:{}:v3", id)
        );
        assert_eq!(index_key("mx"), "wf:index:MX");
        assert_eq!(active_key("mx"), "wf:active:MX");
        assert_eq!(metadata_key(id), format!("wf:metadata:{}", id));
    }
}
