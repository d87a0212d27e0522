//! Identifier derivation shared by the pipeline, dispatcher and HTTP surface.

use chrono::Utc;

/// Conversation id for a single chat. Both peers derive the same id because
/// the participant ids are ordered before joining.
pub fn single_chat_id(user_a: &str, user_b: &str) -> String {
    if user_a <= user_b {
        format!("single_{}_{}", user_a, user_b)
    } else {
        format!("single_{}_{}", user_b, user_a)
    }
}

/// Conversation id for a group chat.
pub fn group_chat_id(group_id: &str) -> String {
    format!("group_{}", group_id)
}

/// 1 = single chat, 2 = group chat.
pub fn conversation_type(group_id: &str) -> i32 {
    if group_id.is_empty() {
        1
    } else {
        2
    }
}

/// Server-minted message id: hex(MD5(timestamp ∥ sender ∥ random)), 32 hex
/// chars, globally unique up to MD5 collision odds.
pub fn new_server_msg_id(sender_id: &str) -> String {
    let stamp = Utc::now().format("%Y%m%d%H%M%S%3f");
    let nonce: u64 = rand::random();
    let digest = md5::compute(format!("{}-{}-{}", stamp, sender_id, nonce));
    format!("{:x}", digest)
}

/// Random id for connections and plain table rows.
pub fn new_entity_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Unix millis on the server clock.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_chat_id_is_symmetric() {
        assert_eq!(single_chat_id("alice", "bob"), "single_alice_bob");
        assert_eq!(single_chat_id("bob", "alice"), "single_alice_bob");
    }

    #[test]
    fn group_chat_id_uses_prefix() {
        assert_eq!(group_chat_id("g1"), "group_g1");
        assert_eq!(conversation_type("g1"), 2);
        assert_eq!(conversation_type(""), 1);
    }

    #[test]
    fn server_msg_id_is_32_hex_chars() {
        let id = new_server_msg_id("alice");
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn server_msg_ids_do_not_collide_trivially() {
        let a = new_server_msg_id("alice");
        let b = new_server_msg_id("alice");
        assert_ne!(a, b);
    }

    #[test]
    fn entity_ids_are_uuid_shaped() {
        let id = new_entity_id();
        assert_eq!(id.len(), 32);
        assert_ne!(id, new_entity_id());
    }
}
