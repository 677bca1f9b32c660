//! 도메인 모델.
//!
//! 변경(mutation) 가능한 엔티티 종류마다 하나의 모듈을 둡니다.

pub mod message;
pub mod user;

pub use message::*;
pub use user::*;
