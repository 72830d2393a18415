//! Latent-variable solvers: the NIPALS building blocks and the estimators
//! built on them.

mod kopls;
mod nipals;
mod opls;
mod opls_nipals;
mod pls;
mod traits;

pub use kopls::{DeflatedKernels, FittedKopls, KoplsRecord, KoplsRegressor, KoplsRegressorBuilder};
pub use nipals::{Nipals, NipalsBuilder, NipalsComponent, PrincipalComponent};
pub use opls::{
    CrossValidationTraceRecord, FittedOpls, OplsComponent, OplsComponentRecord, OplsRecord,
    OplsRegressor, OplsRegressorBuilder, OVERFIT_THRESHOLD,
};
pub use opls_nipals::{OplsNipals, OplsNipalsBuilder, OrthogonalComponent};
pub use pls::{FittedPls, PlsRecord, PlsRegressor, PlsRegressorBuilder};
pub use traits::{FittedRegressor, PlsError, Regressor};
