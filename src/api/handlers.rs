/// Root health check endpoint
pub async fn root() -> &'static str {
    "secure_file_sync - healthy"
}
