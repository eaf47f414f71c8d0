/// Fresh identifiers for locally created tasks and columns.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
