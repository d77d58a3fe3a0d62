// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Each aggregate has its own subdirectory with value objects, models, errors
// and the service that orchestrates it. Storage is behind `crate::store`.
//
// ============================================================================

pub mod order;
