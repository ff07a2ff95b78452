//! Postgres-backed Domain Store

use classhq_shared::{
    Domain, DomainId, SslState, SslStatus, StoreError, Tenant, TenantId, TenantSettings,
    VerificationState,
};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{DomainStore, NewDomain};

const DOMAIN_COLUMNS: &str = "id, tenant_id, hostname, kind, verification_state, \
     verification_token, verification_attempts, last_verification_at, verified_at, \
     ssl_status, ssl_provisioned_at, ssl_expires_at, created_at, updated_at";

const TENANT_COLUMNS: &str =
    "id, name, subdomain, plan, active, locale, branding_color, notifications_enabled, created_at";

/// Database row for a domain (status columns as TEXT to avoid SQLx enum issues)
#[derive(Debug, sqlx::FromRow)]
struct DomainRow {
    id: Uuid,
    tenant_id: Uuid,
    hostname: String,
    kind: String,
    verification_state: String,
    verification_token: String,
    verification_attempts: i32,
    last_verification_at: Option<OffsetDateTime>,
    verified_at: Option<OffsetDateTime>,
    ssl_status: String,
    ssl_provisioned_at: Option<OffsetDateTime>,
    ssl_expires_at: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<DomainRow> for Domain {
    fn from(row: DomainRow) -> Self {
        Self {
            id: DomainId(row.id),
            tenant_id: TenantId(row.tenant_id),
            hostname: row.hostname,
            kind: row.kind.parse().unwrap_or(classhq_shared::DomainKind::Custom),
            verification: row.verification_state.parse().unwrap_or_default(),
            verification_token: row.verification_token,
            verification_attempts: row.verification_attempts,
            last_verification_at: row.last_verification_at,
            verified_at: row.verified_at,
            ssl: SslState {
                status: row.ssl_status.parse().unwrap_or_default(),
                provisioned_at: row.ssl_provisioned_at,
                expires_at: row.ssl_expires_at,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TenantRow {
    id: Uuid,
    name: String,
    subdomain: String,
    plan: String,
    active: bool,
    locale: String,
    branding_color: Option<String>,
    notifications_enabled: bool,
    created_at: OffsetDateTime,
}

impl From<TenantRow> for Tenant {
    fn from(row: TenantRow) -> Self {
        Self {
            id: TenantId(row.id),
            name: row.name,
            subdomain: row.subdomain,
            // Unknown plan strings fall back to the lowest tier
            plan: row.plan.parse().unwrap_or_default(),
            active: row.active,
            settings: TenantSettings {
                locale: row.locale,
                branding_color: row.branding_color,
                notifications_enabled: row.notifications_enabled,
            },
            created_at: row.created_at,
        }
    }
}

fn map_sqlx(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound("row not found".to_string()),
        sqlx::Error::Database(db_err) => {
            // PostgreSQL unique violation
            if db_err.code().as_deref() == Some("23505") {
                StoreError::Conflict("This hostname is already registered".to_string())
            } else {
                StoreError::Unavailable(db_err.to_string())
            }
        }
        other => StoreError::Unavailable(other.to_string()),
    }
}

/// Domain Store backed by the platform's Postgres database
#[derive(Clone)]
pub struct PgDomainStore {
    pool: PgPool,
}

impl PgDomainStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DomainStore for PgDomainStore {
    async fn find_domains_by_hostname(&self, hostname: &str) -> Result<Vec<Domain>, StoreError> {
        let sql = format!("SELECT {DOMAIN_COLUMNS} FROM domains WHERE hostname = $1");
        let rows: Vec<DomainRow> = sqlx::query_as(&sql)
            .bind(hostname)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_domain_by_id(&self, id: DomainId) -> Result<Option<Domain>, StoreError> {
        let sql = format!("SELECT {DOMAIN_COLUMNS} FROM domains WHERE id = $1");
        let row: Option<DomainRow> = sqlx::query_as(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(row.map(Into::into))
    }

    async fn find_tenant_by_id(&self, id: TenantId) -> Result<Option<Tenant>, StoreError> {
        let sql = format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE id = $1");
        let row: Option<TenantRow> = sqlx::query_as(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(row.map(Into::into))
    }

    async fn find_tenant_by_subdomain(&self, subdomain: &str) -> Result<Option<Tenant>, StoreError> {
        let sql = format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE subdomain = $1");
        let row: Option<TenantRow> = sqlx::query_as(&sql)
            .bind(subdomain)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(row.map(Into::into))
    }

    async fn list_domains_for_tenant(&self, id: TenantId) -> Result<Vec<Domain>, StoreError> {
        let sql = format!(
            "SELECT {DOMAIN_COLUMNS} FROM domains WHERE tenant_id = $1 ORDER BY created_at DESC"
        );
        let rows: Vec<DomainRow> = sqlx::query_as(&sql)
            .bind(id.0)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_domain(&self, new: NewDomain) -> Result<Domain, StoreError> {
        // Uniqueness is enforced by the index on hostname; a duplicate
        // surfaces as a Conflict, never an overwrite
        let sql = format!(
            "INSERT INTO domains (tenant_id, hostname, kind, verification_token) \
             VALUES ($1, $2, $3, $4) RETURNING {DOMAIN_COLUMNS}"
        );
        let row: DomainRow = sqlx::query_as(&sql)
            .bind(new.tenant_id.0)
            .bind(&new.hostname)
            .bind(new.kind.as_str())
            .bind(&new.verification_token)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(row.into())
    }

    async fn delete_domain(&self, id: DomainId) -> Result<Domain, StoreError> {
        let sql = format!("DELETE FROM domains WHERE id = $1 RETURNING {DOMAIN_COLUMNS}");
        let row: Option<DomainRow> = sqlx::query_as(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.map(Into::into)
            .ok_or_else(|| StoreError::NotFound(format!("Domain {} not found", id)))
    }

    async fn set_verification_challenge(
        &self,
        id: DomainId,
        token: &str,
    ) -> Result<Domain, StoreError> {
        let sql = format!(
            "UPDATE domains SET verification_token = $2, verification_state = 'pending', \
             verified_at = NULL, updated_at = NOW() WHERE id = $1 RETURNING {DOMAIN_COLUMNS}"
        );
        let row: Option<DomainRow> = sqlx::query_as(&sql)
            .bind(id.0)
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.map(Into::into)
            .ok_or_else(|| StoreError::NotFound(format!("Domain {} not found", id)))
    }

    async fn update_domain_verification(
        &self,
        id: DomainId,
        state: VerificationState,
    ) -> Result<Domain, StoreError> {
        let sql = match state {
            // Idempotent and convergent: the first writer stamps
            // verified-at, concurrent retries leave it untouched
            VerificationState::Verified => format!(
                "UPDATE domains SET verification_state = 'verified', \
                 verified_at = COALESCE(verified_at, NOW()), updated_at = NOW() \
                 WHERE id = $1 RETURNING {DOMAIN_COLUMNS}"
            ),
            // Never downgrade an already-verified domain
            VerificationState::Failed => format!(
                "UPDATE domains SET verification_state = 'failed', updated_at = NOW() \
                 WHERE id = $1 AND verification_state <> 'verified' RETURNING {DOMAIN_COLUMNS}"
            ),
            VerificationState::Pending => format!(
                "UPDATE domains SET verification_state = 'pending', verified_at = NULL, \
                 updated_at = NOW() WHERE id = $1 RETURNING {DOMAIN_COLUMNS}"
            ),
        };

        let row: Option<DomainRow> = sqlx::query_as(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        match row {
            Some(row) => Ok(row.into()),
            // The conditional update matched no row: either the domain is
            // gone, or a Failed write raced a verified transition
            None => self
                .find_domain_by_id(id)
                .await?
                .ok_or_else(|| StoreError::NotFound(format!("Domain {} not found", id))),
        }
    }

    async fn record_verification_attempt(&self, id: DomainId) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE domains SET verification_attempts = verification_attempts + 1, \
             last_verification_at = NOW(), updated_at = NOW() WHERE id = $1",
        )
        .bind(id.0)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn record_ssl_status(&self, id: DomainId, status: SslStatus) -> Result<Domain, StoreError> {
        let sql = format!(
            "UPDATE domains SET ssl_status = $2, \
             ssl_provisioned_at = CASE WHEN $2 = 'active' \
                 THEN COALESCE(ssl_provisioned_at, NOW()) ELSE ssl_provisioned_at END, \
             updated_at = NOW() WHERE id = $1 RETURNING {DOMAIN_COLUMNS}"
        );
        let row: Option<DomainRow> = sqlx::query_as(&sql)
            .bind(id.0)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.map(Into::into)
            .ok_or_else(|| StoreError::NotFound(format!("Domain {} not found", id)))
    }

    async fn list_domains_pending_verification(&self, limit: i64) -> Result<Vec<Domain>, StoreError> {
        let sql = format!(
            "SELECT {DOMAIN_COLUMNS} FROM domains WHERE verification_state = 'pending' \
             ORDER BY last_verification_at ASC NULLS FIRST LIMIT $1"
        );
        let rows: Vec<DomainRow> = sqlx::query_as(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_verified_domains_without_ssl(&self, limit: i64) -> Result<Vec<Domain>, StoreError> {
        let sql = format!(
            "SELECT {DOMAIN_COLUMNS} FROM domains WHERE verification_state = 'verified' \
             AND ssl_status <> 'active' ORDER BY updated_at ASC LIMIT $1"
        );
        let rows: Vec<DomainRow> = sqlx::query_as(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use classhq_shared::DomainKind;

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_duplicate_hostname_conflicts() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = classhq_shared::db::create_pool(&url, 3)
            .await
            .expect("Failed to create pool");
        let store = PgDomainStore::new(pool.clone());

        let tenant_id: Uuid =
            sqlx::query_scalar("INSERT INTO tenants (name, subdomain) VALUES ($1, $2) RETURNING id")
                .bind("Conflict Test School")
                .bind(format!("conflict-test-{}", Uuid::new_v4()))
                .fetch_one(&pool)
                .await
                .unwrap();

        let hostname = format!("{}.example.org", Uuid::new_v4());
        let new = NewDomain {
            tenant_id: TenantId(tenant_id),
            hostname: hostname.clone(),
            kind: DomainKind::Custom,
            verification_token: "tok".to_string(),
        };

        store.insert_domain(new.clone()).await.unwrap();
        let dup = store.insert_domain(new).await;
        assert!(matches!(dup, Err(StoreError::Conflict(_))));

        sqlx::query("DELETE FROM tenants WHERE id = $1")
            .bind(tenant_id)
            .execute(&pool)
            .await
            .unwrap();
    }
}
