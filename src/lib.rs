//! # timecard
//!
//! 직원 출퇴근 기록, 자동 퇴근 처리, 근태 정정 승인 흐름을 담당하는 엔진입니다.
//! 서버 바이너리(`main.rs`)와 통합 테스트(`tests/`)가 이 라이브러리를 함께 씁니다.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
