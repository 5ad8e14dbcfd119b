//! Ticket data model and its schema validator.

pub mod schema;
pub mod ticket;

pub use schema::{FieldIssue, parse_ticket, validate_ticket};
pub use ticket::{
    AgentRole, Artifacts, GitLink, InvalidTransition, LogAction, LogEntry, Owner, Plan, PlanStep,
    Priority, QualityGates, Status, Ticket, TicketId, TicketType,
};
