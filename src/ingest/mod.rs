/// Web service clients for forcing data observations.
///
/// Submodules:
/// - `climate` — hourly meteorological / wind records, monthly bulk CSV.
/// - `hydro` — sub-daily river gauge discharge readings, JSON.

pub mod climate;
pub mod hydro;
