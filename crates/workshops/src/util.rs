use uuid::Uuid;

/// Generates the public (externally visible) id of a new row.
pub fn gen_public_id() -> String {
    Uuid::now_v7().to_string()
}
