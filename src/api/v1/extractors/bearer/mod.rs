/*!
 * Bearer token extractor
 *
 * Responsibility:
 * - Authorization ヘッダから bearer token を取り出して handler に渡す
 * - 取り出せなければ 401 (bearer authentication required)
 */

mod core;

pub use self::core::BearerToken;
