/*
 * Responsibility
 * - middleware の公開インターフェース
 * - Router 単位で apply() する (handler 内では使わない)
 */
pub mod cors;
pub mod http;
pub mod security_headers;
