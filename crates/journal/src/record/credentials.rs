use sha2::{Digest, Sha256};

/// 사용자별 임의 salt
pub fn new_salt() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// sha256(salt || password) 의 hex 문자열
pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn verify_password(salt: &str, password: &str, expected_hash: &str) -> bool {
    hash_password(salt, password) == expected_hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_depends_on_salt() {
        let a = hash_password("salt-a", "hunter2");
        let b = hash_password("salt-b", "hunter2");
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert!(verify_password("salt-a", "hunter2", &a));
        assert!(!verify_password("salt-a", "hunter3", &a));
    }
}
