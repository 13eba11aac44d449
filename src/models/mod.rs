//! # 데이터 모델 모듈
//!
//! 애플리케이션에서 사용하는 데이터 구조체(struct)들을 정의합니다.
//! 각 하위 모듈은 특정 도메인의 데이터 타입을 담당합니다:
//! - `session`: 근태 세션과 휴식 구간
//! - `correction`: 근태 정정 요청
//! - `audit`: 추가 전용(append-only) 감사 로그
//! - `user`: 요청을 보낸 사용자(Actor)
//!
//! `pub use X::*;`로 재공개하므로 `crate::models::TrackingSession`처럼 짧게 쓸 수 있습니다.

pub mod audit;
pub mod correction;
pub mod session;
pub mod user;

pub use audit::*;
pub use correction::*;
pub use session::*;
pub use user::*;
