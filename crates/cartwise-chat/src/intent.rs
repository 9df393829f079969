//! Rule-based shopping intent extraction.
//!
//! Detects category, color, brand and price range in free-form English or
//! Chinese text to produce an [`Intent`]. Extraction is pure and total.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use cartwise_core::types::{Brand, Category, Color};

// =============================================================================
// Intent
// =============================================================================

/// Inclusive price bounds. At least one side is set when present on an
/// [`Intent`], and `min <= max` when both are.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl PriceRange {
    /// Short English phrase for summaries, e.g. "under 500".
    pub fn describe(&self) -> Option<String> {
        match (self.min, self.max) {
            (Some(min), Some(max)) => Some(format!(
                "between {} and {}",
                format_amount(min),
                format_amount(max)
            )),
            (None, Some(max)) => Some(format!("under {}", format_amount(max))),
            (Some(min), None) => Some(format!("over {}", format_amount(min))),
            (None, None) => None,
        }
    }
}

/// Structured shopping attributes extracted from one user message.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    pub has_intent: bool,
    pub category: Option<Category>,
    pub color: Option<Color>,
    pub brand: Option<Brand>,
    pub price_range: Option<PriceRange>,
    /// Matched synonyms and price phrase, in detection order.
    pub keywords: Vec<String>,
}

impl Intent {
    /// An intent with nothing detected.
    pub fn none() -> Self {
        Self::default()
    }
}

/// Render a price without a trailing `.0` for whole amounts.
pub fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

// =============================================================================
// Dictionaries (declaration order decides ties)
// =============================================================================

static CATEGORY_SYNONYMS: &[(&str, Category)] = &[
    ("运动鞋", Category::Shoes),
    ("跑鞋", Category::Shoes),
    ("球鞋", Category::Shoes),
    ("靴子", Category::Shoes),
    ("鞋子", Category::Shoes),
    ("鞋", Category::Shoes),
    ("running shoes", Category::Shoes),
    ("shoes", Category::Shoes),
    ("shoe", Category::Shoes),
    ("sneakers", Category::Shoes),
    ("sneaker", Category::Shoes),
    ("trainers", Category::Shoes),
    ("boots", Category::Shoes),
    ("连衣裙", Category::Clothing),
    ("衣服", Category::Clothing),
    ("外套", Category::Clothing),
    ("t恤", Category::Clothing),
    ("衬衫", Category::Clothing),
    ("卫衣", Category::Clothing),
    ("裤子", Category::Clothing),
    ("裙子", Category::Clothing),
    ("clothing", Category::Clothing),
    ("clothes", Category::Clothing),
    ("t-shirt", Category::Clothing),
    ("shirt", Category::Clothing),
    ("jacket", Category::Clothing),
    ("hoodie", Category::Clothing),
    ("dress", Category::Clothing),
    ("jeans", Category::Clothing),
    ("pants", Category::Clothing),
    ("双肩包", Category::Bags),
    ("手提包", Category::Bags),
    ("背包", Category::Bags),
    ("包包", Category::Bags),
    ("钱包", Category::Bags),
    ("bags", Category::Bags),
    ("bag", Category::Bags),
    ("backpack", Category::Bags),
    ("handbag", Category::Bags),
    ("tote", Category::Bags),
    ("purse", Category::Bags),
    ("笔记本电脑", Category::Electronics),
    ("手机", Category::Electronics),
    ("耳机", Category::Electronics),
    ("电脑", Category::Electronics),
    ("平板", Category::Electronics),
    ("相机", Category::Electronics),
    ("electronics", Category::Electronics),
    ("smartphone", Category::Electronics),
    ("phone", Category::Electronics),
    ("headphones", Category::Electronics),
    ("earbuds", Category::Electronics),
    ("laptop", Category::Electronics),
    ("tablet", Category::Electronics),
    ("camera", Category::Electronics),
    ("化妆品", Category::Beauty),
    ("护肤品", Category::Beauty),
    ("护肤", Category::Beauty),
    ("口红", Category::Beauty),
    ("面霜", Category::Beauty),
    ("香水", Category::Beauty),
    ("beauty", Category::Beauty),
    ("makeup", Category::Beauty),
    ("cosmetics", Category::Beauty),
    ("lipstick", Category::Beauty),
    ("skincare", Category::Beauty),
    ("perfume", Category::Beauty),
    ("运动装备", Category::Sports),
    ("健身", Category::Sports),
    ("瑜伽", Category::Sports),
    ("球拍", Category::Sports),
    ("sports gear", Category::Sports),
    ("sports", Category::Sports),
    ("fitness", Category::Sports),
    ("yoga", Category::Sports),
    ("gym", Category::Sports),
    ("家居", Category::HomeGoods),
    ("厨具", Category::HomeGoods),
    ("床品", Category::HomeGoods),
    ("家纺", Category::HomeGoods),
    ("home goods", Category::HomeGoods),
    ("homeware", Category::HomeGoods),
    ("home decor", Category::HomeGoods),
    ("kitchen", Category::HomeGoods),
    ("bedding", Category::HomeGoods),
    ("cookware", Category::HomeGoods),
    ("配饰", Category::Accessories),
    ("配件", Category::Accessories),
    ("手表", Category::Accessories),
    ("帽子", Category::Accessories),
    ("墨镜", Category::Accessories),
    ("项链", Category::Accessories),
    ("accessories", Category::Accessories),
    ("watch", Category::Accessories),
    ("hat", Category::Accessories),
    ("sunglasses", Category::Accessories),
    ("jewelry", Category::Accessories),
    ("necklace", Category::Accessories),
    ("belt", Category::Accessories),
];

static COLOR_SYNONYMS: &[(&str, Color)] = &[
    ("红色", Color::Red),
    ("红", Color::Red),
    ("red", Color::Red),
    ("蓝色", Color::Blue),
    ("蓝", Color::Blue),
    ("blue", Color::Blue),
    ("navy", Color::Blue),
    ("黑色", Color::Black),
    ("黑", Color::Black),
    ("black", Color::Black),
    ("白色", Color::White),
    ("white", Color::White),
    ("绿色", Color::Green),
    ("绿", Color::Green),
    ("green", Color::Green),
    ("黄色", Color::Yellow),
    ("yellow", Color::Yellow),
    ("粉色", Color::Pink),
    ("粉红", Color::Pink),
    ("pink", Color::Pink),
    ("灰色", Color::Gray),
    ("gray", Color::Gray),
    ("grey", Color::Gray),
    ("棕色", Color::Brown),
    ("咖啡色", Color::Brown),
    ("brown", Color::Brown),
    ("紫色", Color::Purple),
    ("purple", Color::Purple),
    ("橙色", Color::Orange),
    ("橘色", Color::Orange),
    ("orange", Color::Orange),
];

static BRAND_SYNONYMS: &[(&str, Brand)] = &[
    ("耐克", Brand::Nike),
    ("nike", Brand::Nike),
    ("阿迪达斯", Brand::Adidas),
    ("阿迪", Brand::Adidas),
    ("adidas", Brand::Adidas),
    ("彪马", Brand::Puma),
    ("puma", Brand::Puma),
    ("新百伦", Brand::NewBalance),
    ("new balance", Brand::NewBalance),
    ("李宁", Brand::LiNing),
    ("li-ning", Brand::LiNing),
    ("li ning", Brand::LiNing),
    ("安踏", Brand::Anta),
    ("anta", Brand::Anta),
    ("苹果", Brand::Apple),
    ("apple", Brand::Apple),
    ("iphone", Brand::Apple),
    ("三星", Brand::Samsung),
    ("samsung", Brand::Samsung),
    ("华为", Brand::Huawei),
    ("huawei", Brand::Huawei),
    ("小米", Brand::Xiaomi),
    ("xiaomi", Brand::Xiaomi),
    ("索尼", Brand::Sony),
    ("sony", Brand::Sony),
    ("优衣库", Brand::Uniqlo),
    ("uniqlo", Brand::Uniqlo),
    ("zara", Brand::Zara),
    ("蔻驰", Brand::Coach),
    ("coach", Brand::Coach),
];

// =============================================================================
// Price patterns (compiled once, checked in order)
// =============================================================================

#[derive(Clone, Copy, Debug)]
enum Bound {
    Max,
    Min,
    Range,
}

struct PricePattern {
    regex: Regex,
    bound: Bound,
    /// Multipliers for the first and second captured numbers (`k` suffix).
    scales: [f64; 2],
}

impl PricePattern {
    fn has_k(&self) -> bool {
        self.scales.iter().any(|&s| s > 1.0)
    }
}

static PRICE_PATTERNS: LazyLock<Vec<PricePattern>> = LazyLock::new(|| {
    const NUM: &str = r"(\d+(?:\.\d+)?)";
    const CUR: &str = r"[$¥￥]?";
    const MAX_PREFIX: &str =
        r"(?:under|below|less than|cheaper than|up to|at most|no more than|within|不超过|低于|少于|最多|预算)";
    const MIN_PREFIX: &str = r"(?:over|above|more than|at least|高于|超过|不低于|至少)";
    const SEP: &str = r"(?:-|~|到|至|to)";
    const UNIT: &str = r"(?:元|块|rmb|yuan|dollars)?";
    const K: [f64; 2] = [1000.0, 1000.0];
    const UPPER_K: [f64; 2] = [1.0, 1000.0];
    const LOWER_K: [f64; 2] = [1000.0, 1.0];
    const PLAIN: [f64; 2] = [1.0, 1.0];

    let mk = |pattern: String, bound: Bound, scales: [f64; 2]| PricePattern {
        regex: Regex::new(&pattern).expect("Invalid price regex"),
        bound,
        scales,
    };

    vec![
        // k-suffixed forms first so "under 2k" never reads as 2. Only a
        // number followed by `k` is scaled.
        mk(
            format!(r"between\s*{CUR}{NUM}\s*k\s*and\s*{CUR}{NUM}\s*k"),
            Bound::Range,
            K,
        ),
        mk(
            format!(r"between\s*{CUR}{NUM}\s*{UNIT}\s*and\s*{CUR}{NUM}\s*k"),
            Bound::Range,
            UPPER_K,
        ),
        mk(
            format!(r"{CUR}{NUM}\s*k\s*{SEP}\s*{CUR}{NUM}\s*k"),
            Bound::Range,
            K,
        ),
        mk(
            format!(r"{CUR}{NUM}\s*{UNIT}\s*{SEP}\s*{CUR}{NUM}\s*k"),
            Bound::Range,
            UPPER_K,
        ),
        mk(
            format!(r"{CUR}{NUM}\s*k\s*{SEP}\s*{CUR}{NUM}"),
            Bound::Range,
            LOWER_K,
        ),
        mk(format!(r"{MAX_PREFIX}\s*{CUR}{NUM}\s*k"), Bound::Max, K),
        mk(
            format!(r"{NUM}\s*k\s*(?:以下|以内|之内|or less|and under)"),
            Bound::Max,
            K,
        ),
        mk(format!(r"{MIN_PREFIX}\s*{CUR}{NUM}\s*k"), Bound::Min, K),
        mk(
            format!(r"{NUM}\s*k\s*(?:以上|起|or more|and up|\+)"),
            Bound::Min,
            K,
        ),
        mk(
            format!(r"between\s*{CUR}{NUM}\s*{UNIT}\s*and\s*{CUR}{NUM}"),
            Bound::Range,
            PLAIN,
        ),
        mk(
            format!(r"{CUR}{NUM}\s*{UNIT}\s*{SEP}\s*{CUR}{NUM}"),
            Bound::Range,
            PLAIN,
        ),
        mk(format!(r"{MAX_PREFIX}\s*{CUR}{NUM}"), Bound::Max, PLAIN),
        mk(
            format!(r"{NUM}\s*{UNIT}\s*(?:以下|以内|之内|or less|and under)"),
            Bound::Max,
            PLAIN,
        ),
        mk(format!(r"{MIN_PREFIX}\s*{CUR}{NUM}"), Bound::Min, PLAIN),
        mk(
            format!(r"{NUM}\s*{UNIT}\s*(?:以上|起|or more|and up|\+)"),
            Bound::Min,
            PLAIN,
        ),
    ]
});

// =============================================================================
// IntentExtractor
// =============================================================================

/// Dictionary and pattern based intent extractor.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentExtractor;

impl IntentExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract an [`Intent`] from raw user text.
    ///
    /// An intent is detected only when a category synonym is present; the
    /// remaining fields stay empty otherwise.
    pub fn extract(&self, text: &str) -> Intent {
        let normalized = normalize(text);

        let Some((category_term, category)) = find_synonym(&normalized, CATEGORY_SYNONYMS) else {
            return Intent::none();
        };

        let mut keywords = vec![category_term.to_string()];

        let color = find_synonym(&normalized, COLOR_SYNONYMS).map(|(term, color)| {
            keywords.push(term.to_string());
            color
        });

        let brand = find_synonym(&normalized, BRAND_SYNONYMS).map(|(term, brand)| {
            keywords.push(term.to_string());
            brand
        });

        let price_range = extract_price(&normalized).map(|(range, phrase)| {
            keywords.push(phrase);
            range
        });

        Intent {
            has_intent: true,
            category: Some(category),
            color,
            brand,
            price_range,
            keywords,
        }
    }
}

/// Fold fullwidth ASCII to halfwidth and lowercase.
pub fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            '\u{3000}' => ' ',
            _ => c,
        })
        .flat_map(char::to_lowercase)
        .collect()
}

fn find_synonym<T: Copy>(
    text: &str,
    dictionary: &'static [(&'static str, T)],
) -> Option<(&'static str, T)> {
    dictionary
        .iter()
        .copied()
        .find(|(term, _)| contains_term(text, term))
}

/// ASCII terms must sit on word boundaries; CJK terms match anywhere.
fn contains_term(text: &str, term: &str) -> bool {
    if !term.is_ascii() {
        return text.contains(term);
    }
    text.match_indices(term).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + term.len()..].chars().next();
        !before.is_some_and(|c| c.is_ascii_alphanumeric())
            && !after.is_some_and(|c| c.is_ascii_alphanumeric())
    })
}

fn extract_price(text: &str) -> Option<(PriceRange, String)> {
    for pattern in PRICE_PATTERNS.iter() {
        let Some(caps) = pattern.regex.captures(text) else {
            continue;
        };
        let whole = caps.get(0)?;

        // "2kg" is a weight, not a price.
        if pattern.has_k()
            && text[whole.end()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic())
        {
            continue;
        }

        let number = |index: usize| -> Option<f64> {
            caps.get(index)?
                .as_str()
                .parse::<f64>()
                .ok()
                .map(|v| v * pattern.scales[index - 1])
        };

        let first = number(1)?;
        let range = match pattern.bound {
            Bound::Max => PriceRange {
                min: None,
                max: Some(first),
            },
            Bound::Min => PriceRange {
                min: Some(first),
                max: None,
            },
            Bound::Range => {
                let second = number(2)?;
                PriceRange {
                    min: Some(first.min(second)),
                    max: Some(first.max(second)),
                }
            }
        };
        return Some((range, whole.as_str().trim().to_string()));
    }
    None
}
