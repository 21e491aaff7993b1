//! Fertility-clinic integration core.
//!
//! DESIGN
//! ======
//! Two adapters sit behind a shared, snapshot-based configuration store:
//!
//! - `llm`: a multi-provider AI gateway that turns patient context into a
//!   counseling persona and intervention plan, falling back to a
//!   deterministic generator whenever a provider call is unusable.
//! - `emr`: a FHIR R4 sync client that pulls patient records from an EMR
//!   and pushes counseling sessions back, built on the pure mappers in
//!   `fhir`.
//!
//! Route handlers in `routes` are a thin collaborator surface; everything
//! with protocol or format-mapping logic lives in the modules below.

pub mod clinical;
pub mod config;
pub mod emr;
pub mod error;
pub mod fhir;
pub mod llm;
pub mod routes;
pub mod state;
