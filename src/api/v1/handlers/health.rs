/*
 * Responsibility
 * - GET /health (疎通用)
 */
pub async fn health() -> &'static str {
    "ok"
}
