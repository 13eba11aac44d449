use serde::Serialize;

/// 자동 처리(스케줄러)가 남기는 감사 로그의 수행자 이름
pub const SYSTEM_ACTOR: &str = "system";

/// 요청을 보낸 인증된 사용자
///
/// 계정 관리는 이 서비스의 범위 밖이고, 토큰에서 얻은 ID와 관리자 여부만 씁니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub subject_id: String,
    pub is_admin: bool,
}

impl Actor {
    pub fn employee(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            is_admin: false,
        }
    }

    pub fn admin(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            is_admin: true,
        }
    }

    /// 본인 것이거나 관리자면 접근 가능
    pub fn can_access(&self, owner_id: &str) -> bool {
        self.is_admin || self.subject_id == owner_id
    }
}
