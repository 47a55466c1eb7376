/// 盤中報價
pub mod stock_data;
