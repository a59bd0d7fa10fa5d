use crate::domain::UserId;

/// Only explicitly allowed users may drive the forwarder.
pub fn is_authorized(user_id: Option<UserId>, allowed_users: &[i64]) -> bool {
    let Some(user_id) = user_id else {
        return false;
    };
    if allowed_users.is_empty() {
        return false;
    }
    allowed_users.contains(&user_id.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_listed_user() {
        assert!(is_authorized(Some(UserId(5)), &[1, 5]));
        assert!(!is_authorized(Some(UserId(6)), &[1, 5]));
        assert!(!is_authorized(None, &[1, 5]));
        assert!(!is_authorized(Some(UserId(5)), &[]));
    }
}
