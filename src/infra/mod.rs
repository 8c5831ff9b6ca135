pub mod electrum;
pub mod stratum;
