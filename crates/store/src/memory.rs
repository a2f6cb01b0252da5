//! In-memory store backed by DashMap.
//!
//! Same API surface as the PostgreSQL store, for development and testing.

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use crm_core::types::{Activity, Address, Customer, NewActivity, NewSegment, Segment};
use crm_core::CrmResult;
use crm_segmentation::{CompiledPredicate, RecordStore};
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::info;

use crate::{ActivityLog, SegmentStore};

/// Thread-safe in-memory store for customers, segments, and activities.
pub struct MemoryStore {
    customers: DashMap<i64, Customer>,
    segments: DashMap<i64, Segment>,
    activities: DashMap<i64, Activity>,
    next_customer_id: AtomicI64,
    next_segment_id: AtomicI64,
    next_activity_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            customers: DashMap::new(),
            segments: DashMap::new(),
            activities: DashMap::new(),
            next_customer_id: AtomicI64::new(1),
            next_segment_id: AtomicI64::new(1),
            next_activity_id: AtomicI64::new(1),
        }
    }

    pub fn with_demo_data() -> Self {
        let store = Self::new();
        store.seed_demo_data();
        info!(
            customers = store.customers.len(),
            "Memory store initialized (in-memory, development mode)"
        );
        store
    }

    /// Insert a customer, assigning the next id when `id` is zero.
    pub fn insert_customer(&self, mut customer: Customer) -> i64 {
        if customer.id == 0 {
            customer.id = self.next_customer_id.fetch_add(1, Ordering::SeqCst);
        } else {
            self.next_customer_id
                .fetch_max(customer.id + 1, Ordering::SeqCst);
        }
        let id = customer.id;
        self.customers.insert(id, customer);
        id
    }

    pub fn customer_count(&self) -> usize {
        self.customers.len()
    }

    fn matching(&self, predicate: &CompiledPredicate) -> Vec<Customer> {
        let mut rows: Vec<Customer> = self
            .customers
            .iter()
            .filter(|r| predicate.matches(r.value()))
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by_key(|c| c.id);
        rows
    }

    fn seed_demo_data(&self) {
        let first_names = ["John", "Jane", "Michael", "Sarah", "David", "Emily", "Robert", "Lisa", "William", "Jennifer"];
        let last_names = ["Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez", "Martinez"];
        let companies = ["TechCorp", "InnovateLLC", "GlobalSoft", "DataPro", "CloudTech", "SmartSys", "DevCorp", "NextGen", "ProTech", "DigitalMax"];
        let industries = ["Technology", "Healthcare", "Finance", "Retail", "Manufacturing", "Education", "Real Estate", "Media"];
        let statuses = ["Active", "Inactive", "Prospect", "Qualified"];
        let cities = [("New York", "NY"), ("Los Angeles", "CA"), ("Chicago", "IL"), ("Houston", "TX"), ("Phoenix", "AZ")];
        let tags = ["VIP", "Enterprise", "SMB", "Startup", "Lead"];
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).single().unwrap_or_else(Utc::now);

        for i in 0..50usize {
            let (city, state) = cities[i % cities.len()];
            let created_at = base + Duration::days((i * 7) as i64);
            self.insert_customer(Customer {
                id: 0,
                first_name: first_names[i % first_names.len()].to_string(),
                last_name: last_names[(i * 3) % last_names.len()].to_string(),
                email: format!("customer{}@example.com", i + 1),
                phone: Some(format!("+1-555-{:04}", 1000 + i * 37)),
                company: Some(companies[(i * 7) % companies.len()].to_string()),
                industry: Some(industries[i % industries.len()].to_string()),
                status: statuses[i % statuses.len()].to_string(),
                value: (5_000 + (i * 1_913) % 95_000) as f64,
                created_at,
                updated_at: Some(created_at),
                last_contact: Some(created_at + Duration::days(3)),
                address: Some(Address {
                    street: Some(format!("{} Main St", 100 + i * 11)),
                    city: Some(city.to_string()),
                    state: Some(state.to_string()),
                    zip: Some(format!("{:05}", 10_000 + i * 1_777)),
                }),
                tags: tags[..1 + i % 3].iter().map(|t| t.to_string()).collect(),
            });
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn count_matching(&self, predicate: &CompiledPredicate) -> CrmResult<u64> {
        Ok(self
            .customers
            .iter()
            .filter(|r| predicate.matches(r.value()))
            .count() as u64)
    }

    async fn fetch_matching(&self, predicate: &CompiledPredicate) -> CrmResult<Vec<Customer>> {
        Ok(self.matching(predicate))
    }
}

#[async_trait]
impl SegmentStore for MemoryStore {
    async fn list_segments(&self) -> CrmResult<Vec<Segment>> {
        let mut segments: Vec<Segment> = self.segments.iter().map(|r| r.value().clone()).collect();
        segments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(segments)
    }

    async fn get_segment(&self, id: i64) -> CrmResult<Option<Segment>> {
        Ok(self.segments.get(&id).map(|r| r.value().clone()))
    }

    async fn create_segment(&self, segment: NewSegment) -> CrmResult<Segment> {
        let id = self.next_segment_id.fetch_add(1, Ordering::SeqCst);
        let segment = Segment {
            id,
            name: segment.name,
            description: segment.description,
            criteria: segment.criteria,
            created_at: Utc::now(),
        };
        self.segments.insert(id, segment.clone());
        Ok(segment)
    }

    async fn delete_segment(&self, id: i64) -> CrmResult<bool> {
        Ok(self.segments.remove(&id).is_some())
    }
}

#[async_trait]
impl ActivityLog for MemoryStore {
    async fn append(&self, activity: NewActivity) -> CrmResult<Activity> {
        let id = self.next_activity_id.fetch_add(1, Ordering::SeqCst);
        let entry = Activity {
            id,
            action: activity.action.as_str().to_string(),
            user_name: activity.user_name,
            target: activity.target,
            details: activity.details,
            created_at: Utc::now(),
        };
        self.activities.insert(id, entry.clone());
        Ok(entry)
    }

    async fn recent(&self, limit: usize) -> CrmResult<Vec<Activity>> {
        let mut entries: Vec<Activity> = self.activities.iter().map(|r| r.value().clone()).collect();
        entries.sort_by(|a, b| b.id.cmp(&a.id));
        entries.truncate(limit);
        Ok(entries)
    }
}
