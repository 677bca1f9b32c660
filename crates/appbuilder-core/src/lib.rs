//! # Appbuilder Core
//!
//! appbuilder 서버의 핵심 도메인 모델 및 공용 인프라를 제공합니다.
//!
//! 이 크레이트는 서버 전반에서 사용되는 기본 타입을 제공합니다:
//! - 사용자/메시지 도메인 모델
//! - 설정 관리
//! - 로깅 인프라
//! - 에러 타입

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
