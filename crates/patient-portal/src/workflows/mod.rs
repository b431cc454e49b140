pub mod risk_assessment;
