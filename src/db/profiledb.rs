// db/profiledb.rs
use async_trait::async_trait;
use uuid::Uuid;

use super::{db::DBClient, error::StoreError};
use crate::models::usermodel::Profile;

#[async_trait]
pub trait ProfileExt {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError>;

    async fn upsert_profile(&self, profile: Profile) -> Result<Profile, StoreError>;
}

#[async_trait]
impl ProfileExt for DBClient {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError> {
        let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(profile)
    }

    async fn upsert_profile(&self, profile: Profile) -> Result<Profile, StoreError> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (id, full_name, role, phone, email, verification_status)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE
            SET full_name = EXCLUDED.full_name,
                role = EXCLUDED.role,
                phone = EXCLUDED.phone,
                email = EXCLUDED.email,
                verification_status = EXCLUDED.verification_status
            RETURNING *
            "#
        )
        .bind(profile.id)
        .bind(profile.full_name)
        .bind(profile.role)
        .bind(profile.phone)
        .bind(profile.email)
        .bind(profile.verification_status)
        .fetch_one(&self.pool)
        .await?;

        Ok(profile)
    }
}
