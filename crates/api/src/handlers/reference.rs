//! Fixed-response reference endpoints that do not run scripts.

use axum::extract::Path;
use axum::Json;
use serde::Serialize;
use tradesignal_core::error::CoreError;
use tradesignal_core::scripting::registry::normalize_symbol;

use crate::error::AppResult;

/// Symbols with bundled sample data or well-known fallbacks.
pub const SUPPORTED_SYMBOLS: [&str; 5] = ["IBM", "AAPL", "GOOGL", "MSFT", "AMZN"];

const MAX_TOPIC_LEN: usize = 64;

#[derive(Debug, Serialize)]
pub struct SymbolsResponse {
    pub symbols: &'static [&'static str],
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct ExpertAnalysis {
    pub symbol: String,
    pub recommendation: &'static str,
    pub analysis: &'static str,
    pub key_points: [&'static str; 3],
}

#[derive(Debug, Serialize)]
pub struct EducationContent {
    pub topic: String,
    pub title: String,
    pub description: String,
    pub content: String,
}

/// GET /api/symbols
pub async fn list_symbols() -> Json<SymbolsResponse> {
    Json(SymbolsResponse {
        symbols: &SUPPORTED_SYMBOLS,
        count: SUPPORTED_SYMBOLS.len(),
    })
}

/// GET /api/trading-expert/{symbol}
pub async fn expert_analysis(Path(symbol): Path<String>) -> AppResult<Json<ExpertAnalysis>> {
    let symbol = normalize_symbol(&symbol)?;
    tracing::info!(symbol = %symbol, "Serving expert analysis");

    Ok(Json(ExpertAnalysis {
        symbol,
        recommendation: "Hold",
        analysis: "Based on current technical and fundamental indicators, \
                   the stock shows moderate growth potential with balanced risk.",
        key_points: [
            "RSI indicates neutral momentum",
            "P/E ratio suggests fair valuation",
            "Strong support at current levels",
        ],
    }))
}

/// GET /api/education/{topic}
pub async fn education(Path(topic): Path<String>) -> AppResult<Json<EducationContent>> {
    let topic = topic.trim().to_string();
    let valid = !topic.is_empty()
        && topic.len() <= MAX_TOPIC_LEN
        && topic
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ' '));
    if !valid {
        return Err(CoreError::Validation(format!("Invalid topic: {topic}")).into());
    }

    let content = lesson(&topic.to_ascii_lowercase())
        .unwrap_or("Detailed explanation of the topic is not available yet.")
        .to_string();

    Ok(Json(EducationContent {
        title: format!("Understanding {}", topic.to_uppercase()),
        description: format!("Educational content about {topic}"),
        content,
        topic,
    }))
}

fn lesson(topic: &str) -> Option<&'static str> {
    let text = match topic {
        "rsi" => {
            "The Relative Strength Index compares average gains to average losses \
             over 14 periods. Readings above 70 suggest overbought conditions and \
             readings below 30 suggest oversold conditions."
        }
        "macd" => {
            "MACD is the difference between the 12 and 26 period exponential moving \
             averages. A 9 period average of MACD forms the signal line; the \
             histogram is their difference."
        }
        "bollinger-bands" | "bollinger_bands" | "bollinger" => {
            "Bollinger Bands sit two standard deviations above and below a 20 period \
             moving average. Price near the lower band is often read as stretched \
             to the downside."
        }
        "moving-averages" | "moving_averages" | "sma" => {
            "Simple moving averages smooth price over 20, 50 and 200 sessions. Price \
             above the 200 day average is commonly treated as a long-term uptrend."
        }
        "pe-ratio" | "pe_ratio" | "pe" => {
            "The price to earnings ratio divides share price by earnings per share. \
             Compare it against the sector and the company's own history."
        }
        "sentiment" => {
            "News sentiment scores articles from -1 (bearish) to 1 (bullish) and \
             weights each by how relevant it is to the ticker."
        }
        _ => return None,
    };
    Some(text)
}
