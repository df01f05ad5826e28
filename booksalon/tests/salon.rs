#[path = "salon/admin_tests.rs"]
mod admin_tests;
#[path = "salon/job_tests.rs"]
mod job_tests;
#[path = "salon/live_tests.rs"]
mod live_tests;
#[path = "salon/saga_tests.rs"]
mod saga_tests;
#[path = "salon/scenario_tests.rs"]
mod scenario_tests;
#[path = "salon/search_tests.rs"]
mod search_tests;
#[path = "salon/support.rs"]
mod support;
