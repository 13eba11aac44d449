//! 요청 인증. 토큰 검증만 하고 계정 관리는 하지 않습니다.

pub mod auth;

pub use auth::{AuthError, AuthUser, Claims};
