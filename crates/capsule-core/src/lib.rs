//! # Capsule Core
//!
//! Domain logic for the Capsule CRM MCP server, independent of any HTTP or
//! MCP transport.
//!
//! The centrepiece is the [`AllocationCalculator`], which walks the "won"
//! opportunities in a Capsule pipeline and works out how many engineer-days
//! of sold work fall inside a target calendar month. Everything it needs
//! from the CRM is abstracted behind the [`OpportunitySource`] trait, so the
//! calculator can be driven by the live API client or by an in-memory fake
//! in tests.
//!
//! ## Example
//!
//! ```no_run
//! use capsule_core::{AllocationCalculator, AllocationError, OpportunitySource};
//!
//! # async fn example(source: &dyn OpportunitySource) -> Result<(), AllocationError> {
//! let calculator = AllocationCalculator::new();
//! let result = calculator.calculate("2025-03-15", source).await?;
//! println!("{} days sold in March", result.total_days);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod allocation;
pub mod error;
pub mod fields;
pub mod month;
pub mod source;

pub use allocation::{AllocationCalculator, AllocationResult, BreakdownEntry, FieldNames};
pub use error::{AllocationError, SourceError};
pub use fields::{CustomField, FieldDefinition, FieldMap};
pub use month::TargetMonth;
pub use source::{OpportunityDetail, OpportunitySource, OpportunitySummary};
