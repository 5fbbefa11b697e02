//! PostgreSQL adapter for MemberRepository

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    Set, SqlErr, TransactionTrait,
};
use uuid::Uuid;

use crate::domain::entities::{
    ensure_capacity, Member, MemberFilter, MemberId, MemberPatch, MemberStatus, NewMember,
};
use crate::domain::ledger::{
    plan_expiry, plan_revert, toggle_time, LedgerAction, LedgerPlan, ToggleOutcome,
};
use crate::domain::ports::MemberRepository;
use crate::entity::members;
use crate::error::DomainError;

/// PostgreSQL implementation of MemberRepository
pub struct PostgresMemberRepository {
    db: DatabaseConnection,
}

impl PostgresMemberRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Lock the target and every active row, then plan and apply a toggle
    async fn toggle(
        &self,
        id: &MemberId,
        action: LedgerAction,
    ) -> Result<ToggleOutcome, DomainError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        // Inserts take the same lock, so none can land between snapshot and write
        lock_members(&txn).await?;

        // Ordered by id so concurrent toggles take row locks in the same order
        let mut rows: Vec<Member> = members::Entity::find()
            .filter(
                Condition::any()
                    .add(members::Column::Active.eq(true))
                    .add(members::Column::Id.eq(id.0)),
            )
            .order_by_asc(members::Column::Id)
            .lock_exclusive()
            .all(&txn)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(Member::from)
            .collect();

        // Read after locking: every row in the snapshot predates the toggle
        let now = toggle_time(&rows, Utc::now());

        // Early returns drop `txn`, which rolls it back and releases the locks
        let Some(target) = rows.iter().find(|m| m.id == *id).cloned() else {
            return Ok(ToggleOutcome::NotFound);
        };

        let plan = match action {
            LedgerAction::Expire => plan_expiry(&target, &rows, now)?,
            LedgerAction::Revert => plan_revert(&target, &rows, now)?,
        };
        let Some(plan) = plan else {
            return Ok(ToggleOutcome::Unchanged(target));
        };

        write_plan(&txn, &plan).await?;
        txn.commit().await.map_err(db_err)?;

        tracing::info!(
            member_id = %plan.target,
            action = %plan.action,
            affected = ?plan.affected_ids(),
            "Ledger toggle committed"
        );

        plan.apply_to(&mut rows);
        plan.into_change(&rows).map(ToggleOutcome::Applied)
    }
}

#[async_trait]
impl MemberRepository for PostgresMemberRepository {
    async fn find_by_id(&self, id: &MemberId) -> Result<Option<Member>, DomainError> {
        let result = members::Entity::find_by_id(id.0)
            .one(&self.db)
            .await
            .map_err(db_err)?;

        Ok(result.map(|m| m.into()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Member>, DomainError> {
        let result = members::Entity::find()
            .filter(members::Column::Email.eq(email.trim().to_lowercase()))
            .one(&self.db)
            .await
            .map_err(db_err)?;

        Ok(result.map(|m| m.into()))
    }

    async fn find_existing_emails(&self, emails: &[String]) -> Result<Vec<String>, DomainError> {
        if emails.is_empty() {
            return Ok(Vec::new());
        }

        let results = members::Entity::find()
            .filter(members::Column::Email.is_in(emails.iter().map(|e| e.to_lowercase())))
            .all(&self.db)
            .await
            .map_err(db_err)?;

        Ok(results.into_iter().map(|m| m.email).collect())
    }

    async fn list(&self, filter: &MemberFilter) -> Result<Vec<Member>, DomainError> {
        let mut query = members::Entity::find().order_by_asc(members::Column::CreatedAt);
        if let Some(status) = filter.status {
            query = query.filter(members::Column::Active.eq(status == MemberStatus::Active));
        }

        let results = query.all(&self.db).await.map_err(db_err)?;

        // The table never holds more than MAX_MEMBERS rows; search runs in memory
        Ok(results
            .into_iter()
            .map(Member::from)
            .filter(|m| filter.matches(m))
            .collect())
    }

    async fn count(&self) -> Result<u64, DomainError> {
        members::Entity::find().count(&self.db).await.map_err(db_err)
    }

    async fn create(&self, member: &NewMember) -> Result<Member, DomainError> {
        let created = self.create_many(std::slice::from_ref(member)).await?;
        created
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::Internal("Insert returned no row".to_string()))
    }

    async fn create_many(&self, new_members: &[NewMember]) -> Result<Vec<Member>, DomainError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        lock_members(&txn).await?;

        let existing = members::Entity::find().count(&txn).await.map_err(db_err)?;
        ensure_capacity(existing, new_members.len() as u64)?;

        let now = Utc::now().fixed_offset();
        let mut created = Vec::with_capacity(new_members.len());
        for member in new_members {
            let model = members::ActiveModel {
                id: Set(Uuid::new_v4()),
                name: Set(member.name.clone()),
                email: Set(member.email.clone()),
                balance: Set(member.balance),
                active: Set(true),
                expired_at: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
            };

            let result = model.insert(&txn).await.map_err(write_err)?;
            created.push(Member::from(result));
        }

        txn.commit().await.map_err(db_err)?;

        Ok(created)
    }

    async fn update(&self, id: &MemberId, patch: &MemberPatch) -> Result<Member, DomainError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let current = members::Entity::find_by_id(id.0)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| DomainError::NotFound(format!("Member {} not found", id)))?;

        if let Some(email) = &patch.email {
            let taken = members::Entity::find()
                .filter(members::Column::Email.eq(email.as_str()))
                .filter(members::Column::Id.ne(id.0))
                .one(&txn)
                .await
                .map_err(db_err)?;
            if taken.is_some() {
                return Err(DomainError::AlreadyExists(format!(
                    "Member with email '{}' already exists",
                    email
                )));
            }
        }

        let mut model: members::ActiveModel = current.into();
        if let Some(name) = &patch.name {
            model.name = Set(name.clone());
        }
        if let Some(email) = &patch.email {
            model.email = Set(email.clone());
        }
        if let Some(balance) = patch.balance {
            model.balance = Set(balance);
        }
        model.updated_at = Set(Utc::now().fixed_offset());

        let result = model.update(&txn).await.map_err(write_err)?;
        txn.commit().await.map_err(db_err)?;

        Ok(result.into())
    }

    async fn expire(&self, id: &MemberId) -> Result<ToggleOutcome, DomainError> {
        self.toggle(id, LedgerAction::Expire).await
    }

    async fn revert(&self, id: &MemberId) -> Result<ToggleOutcome, DomainError> {
        self.toggle(id, LedgerAction::Revert).await
    }
}

/// Serialise inserts and toggles: concurrent capacity checks cannot both pass
/// and no insert commits inside a toggle's snapshot
async fn lock_members(txn: &DatabaseTransaction) -> Result<(), DomainError> {
    txn.execute_unprepared("LOCK TABLE members IN SHARE ROW EXCLUSIVE MODE")
        .await
        .map_err(db_err)?;
    Ok(())
}

async fn write_plan(txn: &DatabaseTransaction, plan: &LedgerPlan) -> Result<(), DomainError> {
    let at = plan.at.fixed_offset();

    members::ActiveModel {
        id: Set(plan.target.0),
        active: Set(plan.target_active()),
        expired_at: Set(plan.target_expired_at().map(|t| t.fixed_offset())),
        updated_at: Set(at),
        ..Default::default()
    }
    .update(txn)
    .await
    .map_err(write_err)?;

    for adj in &plan.adjustments {
        members::ActiveModel {
            id: Set(adj.member_id.0),
            balance: Set(adj.new_balance),
            updated_at: Set(at),
            ..Default::default()
        }
        .update(txn)
        .await
        .map_err(write_err)?;
    }

    Ok(())
}

fn db_err(e: DbErr) -> DomainError {
    DomainError::Database(e.to_string())
}

/// Map constraint violations on write to domain errors
fn write_err(e: DbErr) -> DomainError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(msg)) => {
            DomainError::AlreadyExists(format!("Email already registered: {}", msg))
        }
        _ => DomainError::Database(e.to_string()),
    }
}

/// Convert SeaORM model to domain entity
impl From<members::Model> for Member {
    fn from(model: members::Model) -> Self {
        Member {
            id: MemberId(model.id),
            name: model.name,
            email: model.email,
            balance: model.balance,
            active: model.active,
            expired_at: model.expired_at.map(|dt| dt.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}
