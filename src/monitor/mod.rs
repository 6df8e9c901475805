//! Operator dashboard

pub mod dashboard;

pub use dashboard::{
    create_router, start_dashboard, DashboardState, SelectStrategyRequest, ToggleLiveRequest,
};
