//! Single-flight access-token renewal
//!
//! At most one renewal request is in flight per client, no matter how many
//! concurrent calls observe an expired token. The first caller builds the
//! renewal future, parks a shared handle in the slot, and later callers
//! clone and await that same handle. The renewal future frees the slot
//! itself, immediately before its result becomes visible to waiters, so
//! the next expiry cycle starts fresh even when the caller that created
//! the handle is cancelled mid-await (caller timeout, aborted task). A
//! cycle whose callers were all cancelled stays in the slot unsettled and
//! is simply driven to completion by the next caller.
//!
//! The slot lock is held across the whole check-and-create section; the
//! renewal itself runs outside the lock.

use std::sync::Arc;

use erp_auth::CredentialStore;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

type SharedRenewal = Shared<BoxFuture<'static, Option<String>>>;

/// Coordinates token renewal for one client instance.
///
/// Resolving with `None` means "could not renew": no refresh token stored,
/// or the renewal call failed (in which case stored credentials were
/// cleared). Callers treat `None` as an expired session; this never errors.
pub(crate) struct RefreshCoordinator {
    http: reqwest::Client,
    base_url: String,
    store: Arc<CredentialStore>,
    in_flight: Arc<Mutex<Option<SharedRenewal>>>,
}

impl RefreshCoordinator {
    pub fn new(http: reqwest::Client, base_url: String, store: Arc<CredentialStore>) -> Self {
        Self {
            http,
            base_url,
            store,
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// Renew the access token, joining an in-flight renewal if one exists.
    pub async fn refresh(&self) -> Option<String> {
        let renewal = {
            let mut slot = self.in_flight.lock().await;
            match slot.as_ref() {
                Some(existing) => {
                    debug!("renewal already in flight, awaiting shared result");
                    existing.clone()
                }
                None => {
                    let Some(refresh) = self.store.refresh_token().await else {
                        debug!("no refresh token stored, renewal not possible");
                        return None;
                    };
                    let call = renew(
                        self.http.clone(),
                        self.base_url.clone(),
                        refresh,
                        Arc::clone(&self.store),
                    );
                    let slot_handle = Arc::clone(&self.in_flight);
                    // Freeing the slot is the future's own settle step, so
                    // it runs no matter which caller drives the renewal to
                    // completion. The slot still holds this handle at that
                    // point: creators only ever fill an empty slot.
                    let renewal = async move {
                        let token = call.await;
                        slot_handle.lock().await.take();
                        token
                    }
                    .boxed()
                    .shared();
                    *slot = Some(renewal.clone());
                    renewal
                }
            }
        };

        renewal.await
    }
}

/// The renewal itself: one wire call, persist on success, clear on failure.
async fn renew(
    http: reqwest::Client,
    base_url: String,
    refresh: String,
    store: Arc<CredentialStore>,
) -> Option<String> {
    match erp_auth::refresh_token(&http, &base_url, &refresh).await {
        Ok(tokens) => {
            if let Err(e) = store
                .set_pair(&tokens.access_token, &tokens.refresh_token)
                .await
            {
                warn!(error = %e, "failed to persist renewed tokens");
            }
            info!("access token renewed");
            Some(tokens.access_token)
        }
        Err(e) => {
            warn!(error = %e, "token renewal failed, clearing stored session");
            if let Err(e) = store.clear().await {
                warn!(error = %e, "failed to clear stored tokens");
            }
            None
        }
    }
}
