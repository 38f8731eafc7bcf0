//! Lifecycle operations of the rate limit resource.
//!
//! Every operation is a single remote round trip (create and update are
//! followed by a read so local state reflects what the service stored).
//! A remote 404 means "absent" for read, delete and exists.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::expand::expand_rule;
use super::flatten::flatten_rule;
use super::schema::RateLimitSpec;
use super::state::ResourceData;
use crate::api::{RateLimitApi, RateLimitRecord};
use crate::error::{AdapterError, Result};
use crate::id::{DomainId, RuleId};

/// Adapter exposing a remote rate limit rule as a managed resource.
pub struct RateLimitResource<A: RateLimitApi> {
    /// The remote service client
    api: Arc<A>,
}

impl<A: RateLimitApi> RateLimitResource<A> {
    /// Create a new resource adapter over the given client.
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    /// Create the rule remotely, record its composite id, then read it back.
    #[instrument(skip(self, data))]
    pub async fn create(&self, data: &mut ResourceData) -> Result<()> {
        let spec = data.spec().ok_or_else(|| {
            AdapterError::Validation("create requires a resource configuration".to_string())
        })?;

        let domain = DomainId::parse(&spec.domain_id)?;
        let record = expand_rule(&spec.rule)?;

        let created = self
            .api
            .create_rate_limit(&spec.cis_id, &domain.zone_id, &record)
            .await
            .map_err(|e| AdapterError::remote("create", spec.domain_id.clone(), e))?;

        if created.id.is_empty() {
            return Err(AdapterError::InvariantViolation(
                "create response has no rule id".to_string(),
            ));
        }

        let id = RuleId::new(created.id, domain.zone_id, spec.cis_id.clone());
        info!(id = %id, "Rate limit created");

        data.set_id(id.encode());
        self.read(data).await
    }

    /// Refresh state from the service. A missing rule clears the id.
    #[instrument(skip(self, data), fields(id = %data.id()))]
    pub async fn read(&self, data: &mut ResourceData) -> Result<()> {
        let id = RuleId::parse(data.id())?;

        let record = match self
            .api
            .get_rate_limit(&id.instance_id, &id.zone_id, &id.rule_id)
            .await
        {
            Ok(record) => record,
            Err(e) if e.is_not_found() => {
                warn!(id = %id, "Rate limit no longer exists, removing from state");
                data.clear_id();
                return Ok(());
            }
            Err(e) => return Err(AdapterError::remote("read", id.encode(), e)),
        };

        let rule = flatten_rule(&record)?;
        debug!(id = %id, "Rate limit read");

        data.set_spec(RateLimitSpec {
            cis_id: id.instance_id.clone(),
            domain_id: id.domain_id().encode(),
            rule_id: Some(id.rule_id),
            rule,
        });
        Ok(())
    }

    /// Push changed configuration, then read the rule back.
    ///
    /// The remote update is issued even when no tracked field changed; in that
    /// case the payload is an empty record.
    #[instrument(skip(self, data), fields(id = %data.id()))]
    pub async fn update(&self, data: &mut ResourceData) -> Result<()> {
        let id = RuleId::parse(data.id())?;

        let changed = data.changed_fields();
        let record = if changed.is_empty() {
            debug!(id = %id, "No tracked field changed, sending empty update");
            RateLimitRecord::default()
        } else {
            let spec = data.spec().ok_or_else(|| {
                AdapterError::Validation("update requires a resource configuration".to_string())
            })?;
            debug!(
                id = %id,
                changed = ?changed.iter().map(|f| f.as_str()).collect::<Vec<_>>(),
                "Sending updated rate limit"
            );
            expand_rule(&spec.rule)?
        };

        self.api
            .update_rate_limit(&id.instance_id, &id.zone_id, &id.rule_id, &record)
            .await
            .map_err(|e| AdapterError::remote("update", id.encode(), e))?;

        info!(id = %id, "Rate limit updated");
        self.read(data).await
    }

    /// Delete the rule. A rule that is already gone counts as deleted.
    #[instrument(skip(self, data), fields(id = %data.id()))]
    pub async fn delete(&self, data: &mut ResourceData) -> Result<()> {
        let id = RuleId::parse(data.id())?;

        match self
            .api
            .delete_rate_limit(&id.instance_id, &id.zone_id, &id.rule_id)
            .await
        {
            Ok(()) => info!(id = %id, "Rate limit deleted"),
            Err(e) if e.is_not_found() => {
                debug!(id = %id, "Rate limit already deleted");
            }
            Err(e) => return Err(AdapterError::remote("delete", id.encode(), e)),
        }

        data.clear_id();
        Ok(())
    }

    /// Whether the rule still exists remotely.
    #[instrument(skip(self, data), fields(id = %data.id()))]
    pub async fn exists(&self, data: &ResourceData) -> Result<bool> {
        let id = RuleId::parse(data.id())?;

        match self
            .api
            .get_rate_limit(&id.instance_id, &id.zone_id, &id.rule_id)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(AdapterError::remote("check existence of", id.encode(), e)),
        }
    }

    /// Bring an existing rule under management from its composite id.
    #[instrument(skip(self))]
    pub async fn import(&self, id: &str) -> Result<ResourceData> {
        let rule_id = RuleId::parse(id)?;

        let mut data = ResourceData::with_id(rule_id.encode());
        self.read(&mut data).await?;

        if !data.exists() {
            return Err(AdapterError::Import(format!(
                "rate limit {} does not exist",
                rule_id
            )));
        }

        info!(id = %rule_id, "Rate limit imported");
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::model::{ActionMode, CorrelateBy};
    use crate::api::ApiError;
    use crate::resource::schema::{ActionConfig, BypassConfig, RuleConfig};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const ZONE: &str = "zone1";
    const INSTANCE: &str = "crn:v1:bluemix:public:internet-svcs:global:a/abc:def::";

    /// In-process stand-in for the remote service.
    #[derive(Default)]
    struct FakeApi {
        rules: Mutex<HashMap<String, RateLimitRecord>>,
        calls: Mutex<Vec<&'static str>>,
        updates: Mutex<Vec<RateLimitRecord>>,
        get_status: Mutex<Option<u16>>,
        delete_status: Mutex<Option<u16>>,
        create_without_id: Mutex<bool>,
    }

    impl FakeApi {
        fn with_rule(rule_id: &str, record: RateLimitRecord) -> Self {
            let api = Self::default();
            api.rules.lock().unwrap().insert(
                rule_id.to_string(),
                RateLimitRecord {
                    id: rule_id.to_string(),
                    ..record
                },
            );
            api
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn record_call(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }
    }

    fn status_error(status: u16) -> ApiError {
        if status == 404 {
            ApiError::NotFound("rule not found".to_string())
        } else {
            ApiError::Status {
                status,
                message: "internal error".to_string(),
            }
        }
    }

    #[async_trait]
    impl RateLimitApi for FakeApi {
        async fn create_rate_limit(
            &self,
            instance_id: &str,
            zone_id: &str,
            record: &RateLimitRecord,
        ) -> std::result::Result<RateLimitRecord, ApiError> {
            self.record_call("create");
            assert_eq!(instance_id, INSTANCE);
            assert_eq!(zone_id, ZONE);

            if *self.create_without_id.lock().unwrap() {
                return Ok(record.clone());
            }

            let mut rules = self.rules.lock().unwrap();
            let id = format!("rule{}", rules.len() + 1);
            let stored = RateLimitRecord {
                id: id.clone(),
                ..record.clone()
            };
            rules.insert(id, stored.clone());
            Ok(stored)
        }

        async fn get_rate_limit(
            &self,
            _instance_id: &str,
            _zone_id: &str,
            rule_id: &str,
        ) -> std::result::Result<RateLimitRecord, ApiError> {
            self.record_call("get");
            if let Some(status) = *self.get_status.lock().unwrap() {
                return Err(status_error(status));
            }
            self.rules
                .lock()
                .unwrap()
                .get(rule_id)
                .cloned()
                .ok_or_else(|| status_error(404))
        }

        async fn update_rate_limit(
            &self,
            _instance_id: &str,
            _zone_id: &str,
            rule_id: &str,
            record: &RateLimitRecord,
        ) -> std::result::Result<RateLimitRecord, ApiError> {
            self.record_call("update");
            self.updates.lock().unwrap().push(record.clone());

            let mut rules = self.rules.lock().unwrap();
            let existing = rules.get_mut(rule_id).ok_or_else(|| status_error(404))?;
            if record.action.is_some() {
                *existing = RateLimitRecord {
                    id: rule_id.to_string(),
                    ..record.clone()
                };
            }
            Ok(existing.clone())
        }

        async fn delete_rate_limit(
            &self,
            _instance_id: &str,
            _zone_id: &str,
            rule_id: &str,
        ) -> std::result::Result<(), ApiError> {
            self.record_call("delete");
            if let Some(status) = *self.delete_status.lock().unwrap() {
                return Err(status_error(status));
            }
            self.rules
                .lock()
                .unwrap()
                .remove(rule_id)
                .map(|_| ())
                .ok_or_else(|| status_error(404))
        }
    }

    fn spec(mode: ActionMode, timeout: u32) -> RateLimitSpec {
        RateLimitSpec {
            cis_id: INSTANCE.to_string(),
            domain_id: format!("{ZONE}:{INSTANCE}"),
            rule_id: None,
            rule: RuleConfig {
                threshold: 100,
                period: 60,
                description: Some("api".to_string()),
                disabled: false,
                action: ActionConfig {
                    mode,
                    timeout,
                    response: None,
                },
                r#match: None,
                correlate: None,
                bypass: Some(vec![BypassConfig {
                    name: Default::default(),
                    value: "example.com/health".to_string(),
                }]),
            },
        }
    }

    fn stored_record() -> RateLimitRecord {
        crate::resource::expand::expand_rule(&spec(ActionMode::Ban, 600).rule).unwrap()
    }

    fn rule_id() -> String {
        format!("rule1:{ZONE}:{INSTANCE}")
    }

    #[tokio::test]
    async fn test_create_sets_id_and_reads_back() {
        let api = Arc::new(FakeApi::default());
        let resource = RateLimitResource::new(api.clone());
        let mut data = ResourceData::new(spec(ActionMode::Ban, 600));

        resource.create(&mut data).await.unwrap();

        assert_eq!(data.id(), rule_id());
        assert_eq!(api.calls(), vec!["create", "get"]);

        let state = data.spec().unwrap();
        assert_eq!(state.rule_id.as_deref(), Some("rule1"));
        assert_eq!(state.cis_id, INSTANCE);
        assert_eq!(state.domain_id, format!("{ZONE}:{INSTANCE}"));
        assert_eq!(state.rule.action.timeout, 600);
        assert_eq!(state.rule.correlate.as_ref().unwrap().by, CorrelateBy::Nat);
        assert_eq!(state.rule.bypass.as_ref().unwrap()[0].value, "example.com/health");
    }

    #[tokio::test]
    async fn test_create_validation_happens_before_network() {
        let api = Arc::new(FakeApi::default());
        let resource = RateLimitResource::new(api.clone());
        let mut data = ResourceData::new(spec(ActionMode::Simulate, 0));

        let err = resource.create(&mut data).await.unwrap_err();
        assert!(matches!(err, AdapterError::Validation(_)));
        assert!(api.calls().is_empty());
        assert!(!data.exists());
    }

    #[tokio::test]
    async fn test_create_rejects_malformed_domain_id() {
        let api = Arc::new(FakeApi::default());
        let resource = RateLimitResource::new(api.clone());
        let mut config = spec(ActionMode::Challenge, 0);
        config.domain_id = "zone-without-instance".to_string();

        let err = resource.create(&mut ResourceData::new(config)).await.unwrap_err();
        assert!(matches!(err, AdapterError::InvalidId(_)));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_without_returned_id_fails() {
        let api = Arc::new(FakeApi::default());
        *api.create_without_id.lock().unwrap() = true;
        let resource = RateLimitResource::new(api.clone());
        let mut data = ResourceData::new(spec(ActionMode::Challenge, 0));

        let err = resource.create(&mut data).await.unwrap_err();
        assert!(matches!(err, AdapterError::InvariantViolation(_)));
        assert!(!data.exists());
    }

    #[tokio::test]
    async fn test_read_not_found_clears_id() {
        let api = Arc::new(FakeApi::default());
        let resource = RateLimitResource::new(api);
        let mut data = ResourceData::with_id(rule_id());

        resource.read(&mut data).await.unwrap();
        assert!(!data.exists());
    }

    #[tokio::test]
    async fn test_read_server_error_keeps_id() {
        let api = Arc::new(FakeApi::with_rule("rule1", stored_record()));
        *api.get_status.lock().unwrap() = Some(500);
        let resource = RateLimitResource::new(api);
        let mut data = ResourceData::with_id(rule_id());

        let err = resource.read(&mut data).await.unwrap_err();
        match err {
            AdapterError::Remote { operation, target, source } => {
                assert_eq!(operation, "read");
                assert_eq!(target, rule_id());
                assert!(!source.is_not_found());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(data.id(), rule_id());
    }

    #[tokio::test]
    async fn test_read_rejects_malformed_id() {
        let resource = RateLimitResource::new(Arc::new(FakeApi::default()));
        let mut data = ResourceData::with_id("rule1:zone1");

        let err = resource.read(&mut data).await.unwrap_err();
        assert!(matches!(err, AdapterError::InvalidId(_)));
    }

    #[tokio::test]
    async fn test_update_with_changes_sends_full_payload() {
        let api = Arc::new(FakeApi::with_rule("rule1", stored_record()));
        let resource = RateLimitResource::new(api.clone());

        let prior = spec(ActionMode::Ban, 600).rule;
        let mut desired = spec(ActionMode::Ban, 600);
        desired.rule.threshold = 500;
        let mut data = ResourceData::planned(rule_id(), desired, prior);

        resource.update(&mut data).await.unwrap();

        assert_eq!(api.calls(), vec!["update", "get"]);
        let sent = api.updates.lock().unwrap()[0].clone();
        assert_eq!(sent.threshold, 500);
        assert!(sent.action.is_some());
        assert_eq!(data.spec().unwrap().rule.threshold, 500);
    }

    #[tokio::test]
    async fn test_update_without_changes_still_calls_remote() {
        let api = Arc::new(FakeApi::with_rule("rule1", stored_record()));
        let resource = RateLimitResource::new(api.clone());

        let current = spec(ActionMode::Ban, 600);
        let mut data = ResourceData::planned(rule_id(), current.clone(), current.rule);

        resource.update(&mut data).await.unwrap();

        assert_eq!(api.calls(), vec!["update", "get"]);
        assert_eq!(api.updates.lock().unwrap()[0], RateLimitRecord::default());
    }

    #[tokio::test]
    async fn test_update_against_read_state_omitting_blocks_is_unchanged() {
        let api = Arc::new(FakeApi::with_rule("rule1", stored_record()));
        let resource = RateLimitResource::new(api.clone());

        let mut current = ResourceData::with_id(rule_id());
        resource.read(&mut current).await.unwrap();
        let prior = current.into_spec().unwrap().rule;

        let desired = spec(ActionMode::Ban, 600);
        assert!(desired.rule.r#match.is_none());
        assert!(desired.rule.correlate.is_none());
        let mut data = ResourceData::planned(rule_id(), desired, prior);
        assert!(data.changed_fields().is_empty());

        resource.update(&mut data).await.unwrap();
        assert_eq!(api.updates.lock().unwrap()[0], RateLimitRecord::default());
    }

    #[tokio::test]
    async fn test_update_validation_error_skips_remote() {
        let api = Arc::new(FakeApi::with_rule("rule1", stored_record()));
        let resource = RateLimitResource::new(api.clone());

        let prior = spec(ActionMode::Ban, 600).rule;
        let desired = spec(ActionMode::Challenge, 600);
        let mut data = ResourceData::planned(rule_id(), desired, prior);

        let err = resource.update(&mut data).await.unwrap_err();
        assert!(matches!(err, AdapterError::Validation(_)));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let api = Arc::new(FakeApi::with_rule("rule1", stored_record()));
        let resource = RateLimitResource::new(api.clone());
        let mut data = ResourceData::with_id(rule_id());

        resource.delete(&mut data).await.unwrap();
        assert!(!data.exists());
        assert!(api.rules.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_not_found_is_success() {
        let resource = RateLimitResource::new(Arc::new(FakeApi::default()));
        let mut data = ResourceData::with_id(rule_id());

        resource.delete(&mut data).await.unwrap();
        assert!(!data.exists());
    }

    #[tokio::test]
    async fn test_delete_server_error() {
        let api = Arc::new(FakeApi::with_rule("rule1", stored_record()));
        *api.delete_status.lock().unwrap() = Some(503);
        let resource = RateLimitResource::new(api);
        let mut data = ResourceData::with_id(rule_id());

        let err = resource.delete(&mut data).await.unwrap_err();
        assert!(matches!(err, AdapterError::Remote { operation: "delete", .. }));
        assert!(data.exists());
    }

    #[tokio::test]
    async fn test_exists() {
        let api = Arc::new(FakeApi::with_rule("rule1", stored_record()));
        let resource = RateLimitResource::new(api.clone());

        assert!(resource.exists(&ResourceData::with_id(rule_id())).await.unwrap());

        let missing = ResourceData::with_id(format!("rule9:{ZONE}:{INSTANCE}"));
        assert!(!resource.exists(&missing).await.unwrap());

        *api.get_status.lock().unwrap() = Some(500);
        assert!(resource.exists(&ResourceData::with_id(rule_id())).await.is_err());
    }

    #[tokio::test]
    async fn test_import_existing_rule() {
        let api = Arc::new(FakeApi::with_rule("rule1", stored_record()));
        let resource = RateLimitResource::new(api);

        let data = resource.import(&rule_id()).await.unwrap();
        assert_eq!(data.id(), rule_id());
        let state = data.into_spec().unwrap();
        assert_eq!(state.rule_id.as_deref(), Some("rule1"));
        assert_eq!(state.rule.action.mode, ActionMode::Ban);
    }

    #[tokio::test]
    async fn test_import_missing_rule_fails() {
        let resource = RateLimitResource::new(Arc::new(FakeApi::default()));

        let err = resource.import(&rule_id()).await.unwrap_err();
        assert!(matches!(err, AdapterError::Import(_)));

        let err = resource.import("not-a-composite-id").await.unwrap_err();
        assert!(matches!(err, AdapterError::InvalidId(_)));
    }
}
