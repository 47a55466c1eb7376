/// 盤中報價擷取
pub mod intraday_quote;
