// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Accounts (profiles plus handle/email uniqueness claims)
//! - Listings and container listings (CRUD, interest toggles, completion)
//! - Conversations and messages
//! - Orders and reviews (with counter increments)
//!
//! Uniqueness of handles and emails is enforced with claim documents in
//! dedicated collections, written with create semantics: an already-exists
//! failure from Firestore is the duplicate signal the callers branch on.

use crate::db::collections;
use crate::error::AppError;
use crate::models::{Account, ContainerListing, Conversation, Listing, Message, Order, Review};
use futures_util::{stream, StreamExt};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

const MAX_CONCURRENT_DB_OPS: usize = 50;

/// A uniqueness claim: the document id is the claimed value, the body
/// records which account owns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniqueClaim {
    pub owner_id: String,
}

/// Filters for the public listing browse queries.
#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub owner_id: Option<String>,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Generic Document Helpers ────────────────────────────────

    async fn get_doc<T>(&self, collection: &str, id: &str) -> Result<Option<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collection)
            .obj::<T>()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Write with upsert semantics.
    async fn upsert_doc<T>(&self, collection: &str, id: &str, object: &T) -> Result<(), AppError>
    where
        T: Serialize + DeserializeOwned + Sync + Send,
    {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collection)
            .document_id(id)
            .object(object)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Write with create semantics: fails if the document already exists.
    ///
    /// Returns `false` on the already-exists case, the storage-layer
    /// unique-violation signal callers translate into conflicts.
    async fn insert_doc<T>(&self, collection: &str, id: &str, object: &T) -> Result<bool, AppError>
    where
        T: Serialize + DeserializeOwned + Sync + Send,
    {
        let result: Result<T, _> = self
            .get_client()?
            .fluent()
            .insert()
            .into(collection)
            .document_id(id)
            .object(object)
            .execute()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(firestore::errors::FirestoreError::DataConflictError(_)) => Ok(false),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    async fn delete_doc(&self, collection: &str, id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collection)
            .document_id(id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Uniqueness Claims ───────────────────────────────────────

    fn claim_doc_id(key: &str) -> String {
        urlencoding::encode(key).into_owned()
    }

    /// Claim a unique value for an account. Returns `false` if the value is
    /// already claimed (by anyone, including the same account).
    pub async fn claim_unique(
        &self,
        collection: &str,
        key: &str,
        owner_id: &str,
    ) -> Result<bool, AppError> {
        let claim = UniqueClaim {
            owner_id: owner_id.to_string(),
        };
        self.insert_doc(collection, &Self::claim_doc_id(key), &claim)
            .await
    }

    /// Release a previously claimed value. Deleting a missing claim is fine.
    pub async fn release_unique(&self, collection: &str, key: &str) -> Result<(), AppError> {
        self.delete_doc(collection, &Self::claim_doc_id(key)).await
    }

    /// Look up which account owns a claimed value.
    pub async fn lookup_unique(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<String>, AppError> {
        let claim: Option<UniqueClaim> = self.get_doc(collection, &Self::claim_doc_id(key)).await?;
        Ok(claim.map(|c| c.owner_id))
    }

    // ─── Account Operations ──────────────────────────────────────

    pub async fn get_account(&self, id: &str) -> Result<Option<Account>, AppError> {
        self.get_doc(collections::ACCOUNTS, id).await
    }

    /// Find an account by its normalized handle, via the claim index.
    pub async fn find_account_by_handle(
        &self,
        handle: &str,
    ) -> Result<Option<Account>, AppError> {
        match self.lookup_unique(collections::HANDLES, handle).await? {
            Some(owner_id) => self.get_account(&owner_id).await,
            None => Ok(None),
        }
    }

    /// Find an account by its email, via the claim index.
    pub async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        match self.lookup_unique(collections::EMAILS, email).await? {
            Some(owner_id) => self.get_account(&owner_id).await,
            None => Ok(None),
        }
    }

    /// Cheap existence probe used by handle-collision probing.
    pub async fn handle_taken(&self, handle: &str) -> Result<bool, AppError> {
        Ok(self
            .lookup_unique(collections::HANDLES, handle)
            .await?
            .is_some())
    }

    /// Create an account together with its handle and email claims.
    ///
    /// The three writes are not transactional; claims are released again if
    /// a later step fails so no half-created account keeps a value locked.
    /// Returns a `Conflict` naming the clashing field when a claim loses.
    pub async fn create_account(&self, account: &Account) -> Result<(), AppError> {
        if !self
            .claim_unique(collections::HANDLES, &account.handle, &account.id)
            .await?
        {
            return Err(AppError::Conflict("Username is already taken".to_string()));
        }

        let email_claimed = self
            .claim_unique(collections::EMAILS, &account.email, &account.id)
            .await;
        match email_claimed {
            Ok(true) => {}
            Ok(false) => {
                let _ = self
                    .release_unique(collections::HANDLES, &account.handle)
                    .await;
                return Err(AppError::Conflict(
                    "Email is already registered".to_string(),
                ));
            }
            Err(e) => {
                let _ = self
                    .release_unique(collections::HANDLES, &account.handle)
                    .await;
                return Err(e);
            }
        }

        match self
            .insert_doc(collections::ACCOUNTS, &account.id, account)
            .await
        {
            Ok(true) => Ok(()),
            Ok(false) => {
                self.release_account_claims(account).await;
                Err(AppError::Conflict("Account already exists".to_string()))
            }
            Err(e) => {
                self.release_account_claims(account).await;
                Err(e)
            }
        }
    }

    /// Best-effort release of both claims when account creation fails.
    async fn release_account_claims(&self, account: &Account) {
        let _ = self
            .release_unique(collections::HANDLES, &account.handle)
            .await;
        let _ = self
            .release_unique(collections::EMAILS, &account.email)
            .await;
    }

    pub async fn update_account(&self, account: &Account) -> Result<(), AppError> {
        self.upsert_doc(collections::ACCOUNTS, &account.id, account)
            .await
    }

    /// Move a uniqueness claim from one value to another for the same owner.
    ///
    /// Claims the new value first so a losing race never drops the old one.
    pub async fn reassign_unique(
        &self,
        collection: &str,
        old_key: &str,
        new_key: &str,
        owner_id: &str,
    ) -> Result<bool, AppError> {
        if !self.claim_unique(collection, new_key, owner_id).await? {
            return Ok(false);
        }
        self.release_unique(collection, old_key).await?;
        Ok(true)
    }

    /// Atomically add a rating to a seller's aggregate fields.
    pub async fn increment_seller_rating(
        &self,
        seller_id: &str,
        rating: u8,
        now: &str,
    ) -> Result<(), AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let account: Option<Account> = self.get_account(seller_id).await?;
        let Some(mut account) = account else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!(
                "Seller {} not found",
                seller_id
            )));
        };

        account.rating_sum += u32::from(rating);
        account.rating_count += 1;
        account.updated_at = now.to_string();

        client
            .fluent()
            .update()
            .in_col(collections::ACCOUNTS)
            .document_id(&account.id)
            .object(&account)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add rating update: {}", e)))?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        Ok(())
    }

    /// Delete an account and everything it owns.
    ///
    /// Removes the profile, its uniqueness claims, and its listings.
    /// Returns the number of documents deleted.
    pub async fn delete_account_data(&self, account: &Account) -> Result<usize, AppError> {
        let mut deleted_count = 0;

        let listings: Vec<Listing> = self
            .listings_for_owner(collections::LISTINGS, &account.id)
            .await?;
        for listing in &listings {
            self.delete_doc(collections::LISTINGS, &listing.id).await?;
        }
        deleted_count += listings.len();

        let containers: Vec<ContainerListing> = self
            .listings_for_owner(collections::CONTAINER_LISTINGS, &account.id)
            .await?;
        for container in &containers {
            self.delete_doc(collections::CONTAINER_LISTINGS, &container.id)
                .await?;
        }
        deleted_count += containers.len();

        self.release_unique(collections::HANDLES, &account.handle)
            .await?;
        self.release_unique(collections::EMAILS, &account.email)
            .await?;
        deleted_count += 2;

        self.delete_doc(collections::ACCOUNTS, &account.id).await?;
        deleted_count += 1;

        tracing::info!(
            account_id = %account.id,
            deleted_count,
            "Account data deletion complete"
        );

        Ok(deleted_count)
    }

    /// Fetch several accounts concurrently, skipping ids that no longer
    /// resolve (deleted accounts linger in interested-sets).
    pub async fn accounts_by_ids(&self, ids: &[String]) -> Result<Vec<Account>, AppError> {
        let results: Vec<Result<Option<Account>, AppError>> = stream::iter(ids.to_vec())
            .map(|id| async move { self.get_account(&id).await })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect()
            .await;

        let mut accounts = Vec::new();
        for result in results {
            if let Some(account) = result? {
                accounts.push(account);
            }
        }
        Ok(accounts)
    }

    async fn listings_for_owner<T>(
        &self,
        collection: &str,
        owner_id: &str,
    ) -> Result<Vec<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        let owner_id = owner_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collection)
            .filter(move |q| q.for_all([q.field("owner_id").eq(owner_id.clone())]))
            .obj::<T>()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Listing Operations ──────────────────────────────────────

    pub async fn get_listing(&self, id: &str) -> Result<Option<Listing>, AppError> {
        self.get_doc(collections::LISTINGS, id).await
    }

    pub async fn insert_listing(&self, listing: &Listing) -> Result<(), AppError> {
        self.upsert_doc(collections::LISTINGS, &listing.id, listing)
            .await
    }

    pub async fn update_listing(&self, listing: &Listing) -> Result<(), AppError> {
        self.upsert_doc(collections::LISTINGS, &listing.id, listing)
            .await
    }

    pub async fn delete_listing(&self, id: &str) -> Result<(), AppError> {
        self.delete_doc(collections::LISTINGS, id).await
    }

    /// Browse listings with optional filters, newest first.
    pub async fn query_listings(
        &self,
        filter: &ListingFilter,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Listing>, AppError> {
        self.query_listing_collection(collections::LISTINGS, filter, limit, offset)
            .await
    }

    pub async fn get_container_listing(
        &self,
        id: &str,
    ) -> Result<Option<ContainerListing>, AppError> {
        self.get_doc(collections::CONTAINER_LISTINGS, id).await
    }

    pub async fn insert_container_listing(
        &self,
        listing: &ContainerListing,
    ) -> Result<(), AppError> {
        self.upsert_doc(collections::CONTAINER_LISTINGS, &listing.id, listing)
            .await
    }

    pub async fn update_container_listing(
        &self,
        listing: &ContainerListing,
    ) -> Result<(), AppError> {
        self.upsert_doc(collections::CONTAINER_LISTINGS, &listing.id, listing)
            .await
    }

    pub async fn delete_container_listing(&self, id: &str) -> Result<(), AppError> {
        self.delete_doc(collections::CONTAINER_LISTINGS, id).await
    }

    pub async fn query_container_listings(
        &self,
        filter: &ListingFilter,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ContainerListing>, AppError> {
        self.query_listing_collection(collections::CONTAINER_LISTINGS, filter, limit, offset)
            .await
    }

    async fn query_listing_collection<T>(
        &self,
        collection: &str,
        filter: &ListingFilter,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        // Container listings filter on ports, luggage listings on cities;
        // both collections store them under origin/destination field names.
        let origin = filter.origin.clone();
        let destination = filter.destination.clone();
        let owner_id = filter.owner_id.clone();

        let query = self.get_client()?.fluent().select().from(collection);

        let query = if origin.is_some() || destination.is_some() || owner_id.is_some() {
            query.filter(move |q| {
                q.for_all([
                    origin.as_ref().and_then(|v| q.field("origin").eq(v.clone())),
                    destination
                        .as_ref()
                        .and_then(|v| q.field("destination").eq(v.clone())),
                    owner_id
                        .as_ref()
                        .and_then(|v| q.field("owner_id").eq(v.clone())),
                ])
            })
        } else {
            query
        };

        query
            .order_by([(
                "created_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .limit(limit)
            .offset(offset)
            .obj::<T>()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Interest Toggles ────────────────────────────────────────

    /// Flip an account's membership in a luggage listing's interested-set.
    ///
    /// Runs in a transaction so concurrent toggles cannot lose each other's
    /// updates. Returns the updated set and whether the account was added.
    pub async fn toggle_listing_interest(
        &self,
        listing_id: &str,
        account_id: &str,
        now: &str,
    ) -> Result<(Vec<String>, bool), AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let listing: Option<Listing> = self.get_listing(listing_id).await?;
        let Some(mut listing) = listing else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!(
                "Listing {} not found",
                listing_id
            )));
        };

        let added = toggle_membership(&mut listing.interested, account_id);
        listing.updated_at = now.to_string();

        client
            .fluent()
            .update()
            .in_col(collections::LISTINGS)
            .document_id(&listing.id)
            .object(&listing)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add interest update: {}", e)))?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        Ok((listing.interested, added))
    }

    /// Container-listing variant of [`toggle_listing_interest`].
    pub async fn toggle_container_interest(
        &self,
        listing_id: &str,
        account_id: &str,
        now: &str,
    ) -> Result<(Vec<String>, bool), AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let listing: Option<ContainerListing> = self.get_container_listing(listing_id).await?;
        let Some(mut listing) = listing else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!(
                "Listing {} not found",
                listing_id
            )));
        };

        let added = toggle_membership(&mut listing.interested, account_id);
        listing.updated_at = now.to_string();

        client
            .fluent()
            .update()
            .in_col(collections::CONTAINER_LISTINGS)
            .document_id(&listing.id)
            .object(&listing)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add interest update: {}", e)))?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        Ok((listing.interested, added))
    }

    // ─── Completion ──────────────────────────────────────────────

    /// Mark a luggage listing completed and credit the owner's trip counter.
    ///
    /// Re-checks the completion flag inside the transaction so two racing
    /// completion requests cannot double-credit the owner.
    pub async fn complete_listing(&self, listing_id: &str, now: &str) -> Result<Listing, AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let listing: Option<Listing> = self.get_listing(listing_id).await?;
        let Some(mut listing) = listing else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!(
                "Listing {} not found",
                listing_id
            )));
        };

        if listing.completed {
            let _ = transaction.rollback().await;
            return Err(AppError::Validation(
                "Listing is already completed".to_string(),
            ));
        }

        let owner: Option<Account> = self.get_account(&listing.owner_id).await?;
        let Some(mut owner) = owner else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!(
                "Owner account {} not found",
                listing.owner_id
            )));
        };

        listing.completed = true;
        listing.updated_at = now.to_string();
        owner.trips_completed += 1;
        owner.updated_at = now.to_string();

        client
            .fluent()
            .update()
            .in_col(collections::LISTINGS)
            .document_id(&listing.id)
            .object(&listing)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add listing update: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::ACCOUNTS)
            .document_id(&owner.id)
            .object(&owner)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add owner update: {}", e)))?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(listing_id, owner_id = %listing.owner_id, "Listing completed");

        Ok(listing)
    }

    /// Container-listing variant of [`complete_listing`].
    pub async fn complete_container_listing(
        &self,
        listing_id: &str,
        now: &str,
    ) -> Result<ContainerListing, AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let listing: Option<ContainerListing> = self.get_container_listing(listing_id).await?;
        let Some(mut listing) = listing else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!(
                "Listing {} not found",
                listing_id
            )));
        };

        if listing.completed {
            let _ = transaction.rollback().await;
            return Err(AppError::Validation(
                "Listing is already completed".to_string(),
            ));
        }

        let owner: Option<Account> = self.get_account(&listing.owner_id).await?;
        let Some(mut owner) = owner else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!(
                "Owner account {} not found",
                listing.owner_id
            )));
        };

        listing.completed = true;
        listing.updated_at = now.to_string();
        owner.trips_completed += 1;
        owner.updated_at = now.to_string();

        client
            .fluent()
            .update()
            .in_col(collections::CONTAINER_LISTINGS)
            .document_id(&listing.id)
            .object(&listing)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add listing update: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::ACCOUNTS)
            .document_id(&owner.id)
            .object(&owner)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add owner update: {}", e)))?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        Ok(listing)
    }

    // ─── Conversation Operations ─────────────────────────────────

    pub async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, AppError> {
        self.get_doc(collections::CONVERSATIONS, id).await
    }

    pub async fn update_conversation(&self, conversation: &Conversation) -> Result<(), AppError> {
        self.upsert_doc(collections::CONVERSATIONS, &conversation.id, conversation)
            .await
    }

    /// Find or create the conversation for a (seller, buyer) pair.
    ///
    /// Create semantics make first contact idempotent: if two requests race,
    /// the loser re-reads the winner's document. Returns whether this call
    /// created the thread.
    pub async fn find_or_create_conversation(
        &self,
        conversation: &Conversation,
    ) -> Result<(Conversation, bool), AppError> {
        if let Some(existing) = self.get_conversation(&conversation.id).await? {
            return Ok((existing, false));
        }

        if self
            .insert_doc(collections::CONVERSATIONS, &conversation.id, conversation)
            .await?
        {
            return Ok((conversation.clone(), true));
        }

        // Lost the creation race; the other side's document wins.
        let existing = self
            .get_conversation(&conversation.id)
            .await?
            .ok_or_else(|| {
                AppError::Database("Conversation vanished after duplicate create".to_string())
            })?;
        Ok((existing, false))
    }

    /// All conversations an account participates in, newest activity first.
    pub async fn conversations_for_account(
        &self,
        account_id: &str,
    ) -> Result<Vec<Conversation>, AppError> {
        let (as_seller, as_buyer) = tokio::try_join!(
            self.conversations_by_field("seller_id", account_id),
            self.conversations_by_field("buyer_id", account_id),
        )?;

        let mut conversations = as_seller;
        conversations.extend(as_buyer);
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(conversations)
    }

    async fn conversations_by_field(
        &self,
        field: &str,
        account_id: &str,
    ) -> Result<Vec<Conversation>, AppError> {
        let field = field.to_string();
        let account_id = account_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::CONVERSATIONS)
            .filter(move |q| q.for_all([q.field(field.clone()).eq(account_id.clone())]))
            .obj::<Conversation>()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn insert_message(&self, message: &Message) -> Result<(), AppError> {
        self.upsert_doc(collections::MESSAGES, &message.id, message)
            .await
    }

    /// Messages in a conversation, oldest first.
    pub async fn messages_for_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Message>, AppError> {
        let conversation_id = conversation_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::MESSAGES)
            .filter(move |q| {
                q.for_all([q.field("conversation_id").eq(conversation_id.clone())])
            })
            .order_by([(
                "created_at",
                firestore::FirestoreQueryDirection::Ascending,
            )])
            .obj::<Message>()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Order Operations ────────────────────────────────────────

    pub async fn get_order(&self, id: &str) -> Result<Option<Order>, AppError> {
        self.get_doc(collections::ORDERS, id).await
    }

    /// Record an order and bump the listing's sales counter atomically.
    pub async fn record_order(
        &self,
        order: &Order,
        listing_collection: &str,
    ) -> Result<(), AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        match listing_collection {
            collections::LISTINGS => {
                let listing: Option<Listing> = self.get_listing(&order.listing_id).await?;
                let Some(mut listing) = listing else {
                    let _ = transaction.rollback().await;
                    return Err(AppError::NotFound(format!(
                        "Listing {} not found",
                        order.listing_id
                    )));
                };
                listing.sales_count += 1;
                listing.updated_at = order.created_at.clone();
                client
                    .fluent()
                    .update()
                    .in_col(collections::LISTINGS)
                    .document_id(&listing.id)
                    .object(&listing)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!("Failed to add sales update: {}", e))
                    })?;
            }
            _ => {
                let listing: Option<ContainerListing> =
                    self.get_container_listing(&order.listing_id).await?;
                let Some(mut listing) = listing else {
                    let _ = transaction.rollback().await;
                    return Err(AppError::NotFound(format!(
                        "Listing {} not found",
                        order.listing_id
                    )));
                };
                listing.sales_count += 1;
                listing.updated_at = order.created_at.clone();
                client
                    .fluent()
                    .update()
                    .in_col(collections::CONTAINER_LISTINGS)
                    .document_id(&listing.id)
                    .object(&listing)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!("Failed to add sales update: {}", e))
                    })?;
            }
        }

        client
            .fluent()
            .update()
            .in_col(collections::ORDERS)
            .document_id(&order.id)
            .object(order)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add order write: {}", e)))?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        Ok(())
    }

    /// All orders an account is party to, newest first.
    pub async fn orders_for_account(&self, account_id: &str) -> Result<Vec<Order>, AppError> {
        let (as_buyer, as_seller) = tokio::try_join!(
            self.orders_by_field("buyer_id", account_id),
            self.orders_by_field("seller_id", account_id),
        )?;

        let mut orders = as_buyer;
        orders.extend(as_seller);
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn orders_by_field(
        &self,
        field: &str,
        account_id: &str,
    ) -> Result<Vec<Order>, AppError> {
        let field = field.to_string();
        let account_id = account_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::ORDERS)
            .filter(move |q| q.for_all([q.field(field.clone()).eq(account_id.clone())]))
            .obj::<Order>()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Review Operations ───────────────────────────────────────

    /// Insert a review keyed by (reviewer, seller). Returns `false` when the
    /// pair already reviewed, the at-most-one-review signal.
    pub async fn insert_review(&self, review: &Review) -> Result<bool, AppError> {
        self.insert_doc(collections::REVIEWS, &review.id, review)
            .await
    }

    pub async fn delete_review(&self, id: &str) -> Result<(), AppError> {
        self.delete_doc(collections::REVIEWS, id).await
    }

    /// Reviews received by a seller, newest first.
    pub async fn reviews_for_seller(&self, seller_id: &str) -> Result<Vec<Review>, AppError> {
        let seller_id = seller_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::REVIEWS)
            .filter(move |q| q.for_all([q.field("seller_id").eq(seller_id.clone())]))
            .order_by([(
                "created_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .obj::<Review>()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

/// Flip membership in an interested-set. Returns `true` if the id was added.
fn toggle_membership(set: &mut Vec<String>, account_id: &str) -> bool {
    if let Some(pos) = set.iter().position(|id| id == account_id) {
        set.remove(pos);
        false
    } else {
        set.push(account_id.to_string());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_membership_is_an_involution() {
        let mut set = vec!["a".to_string()];

        assert!(toggle_membership(&mut set, "b"));
        assert_eq!(set, vec!["a".to_string(), "b".to_string()]);

        assert!(!toggle_membership(&mut set, "b"));
        assert_eq!(set, vec!["a".to_string()]);
    }

    #[test]
    fn claim_doc_ids_are_safe_for_firestore() {
        assert_eq!(FirestoreDb::claim_doc_id("alice"), "alice");
        // '/' is not allowed in document ids
        assert_eq!(FirestoreDb::claim_doc_id("a/b"), "a%2Fb");
        assert_eq!(
            FirestoreDb::claim_doc_id("user@example.com"),
            "user%40example.com"
        );
    }
}
