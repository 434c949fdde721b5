//! fieldcheck test engine
//!
//! Runs an ordered, dependency-aware suite of integration tests against a
//! live field-service CRM API:
//! - Test definitions declare the ids they depend on
//! - The scheduler validates the graph and linearizes it
//! - The runner executes one test at a time against a shared context
//! - Every HTTP exchange is captured, masked, and replayable as curl
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    fieldcheck test engine                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Registry (ordered groups of TestDefinition)                │
//! │    └── Scheduler::plan(registry, selection) -> Plan         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── gate: hard-skip on failed / missing dependency       │
//! │    ├── invoke(test, &mut TestContext) -> TestResponse       │
//! │    └── RunEvent stream (Started / Finished / Completed)     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestContext                                                │
//! │    ├── FixtureStore (ids created by earlier tests)          │
//! │    ├── SessionCredentials (token, user id)                  │
//! │    └── ApiClient (bearer + tenant, 401 -> re-login)         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  SuiteReport -> test-results.json                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod client;
pub mod config;
pub mod context;
pub mod definition;
pub mod error;
pub mod registry;
pub mod report;
pub mod runner;
pub mod scheduler;
pub mod suites;

pub use config::{ApiConfig, CredentialsConfig, HarnessConfig};
pub use client::{ApiClient, ApiRequest, ApiResponse, Exchange};
pub use context::TestContext;
pub use definition::{TestDefinition, TestFuture, TestOutcome, TestResponse};
pub use error::{HarnessError, HarnessResult};
pub use registry::{Registry, Selection};
pub use report::{CategoryTally, SkipKind, SuiteReport, TestResult, TestStatus, REPORT_FILE};
pub use runner::{RunEvent, RunnerConfig, TestRunner};
pub use scheduler::{ExecutionPlan, PlannedTest, Scheduler};
