//! Operational prediction of the spring diatom phytoplankton bloom in a
//! coastal strait.
//!
//! The service harvests wind, meteorological, and river flow observations
//! from public web data services, renders them into the fixed-column
//! forcing files a one-dimensional ocean simulation expects, runs that
//! simulation, and post-processes its biology time series to predict the
//! calendar date of the spring bloom. An ensemble mode runs one simulation
//! per historical forcing year and reduces the resulting bloom date
//! distribution to percentile predictions.

pub mod bloom;
pub mod config;
pub mod driver;
pub mod ensemble;
pub mod forcing;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod results;
pub mod sim;
pub mod stations;
