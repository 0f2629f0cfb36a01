//! # 实体定义测试

#[cfg(test)]
mod tests {
    use crate::{credentials, providers, users};
    use sea_orm::{EntityName, Set};

    #[test]
    fn test_table_names() {
        assert_eq!(users::Entity.table_name(), "users");
        assert_eq!(providers::Entity.table_name(), "providers");
        assert_eq!(credentials::Entity.table_name(), "credentials");
    }

    #[test]
    fn test_credential_active_model() {
        let record = credentials::ActiveModel {
            owner: Set("default".to_string()),
            provider_id: Set(1),
            ciphertext: Set("Y2lwaGVy".to_string()),
            iv: Set("aXY=".to_string()),
            ..Default::default()
        };

        assert_eq!(record.owner.as_ref(), "default");
        assert_eq!(record.provider_id.as_ref(), &1);
    }
}
