//! Built-in rule tables.

use crate::error::Result;
use crate::exclusion::{ExclusionRule, ExclusionRuleSet};
use crate::matcher::{Applicability, MatchTarget, Marker, MarkerTable, Matcher};
use crate::patterns::{ClassificationPattern, PatternRegistry, PatternScope};
use crate::rulebook::Markers;

const GENERIC_URL_PATTERNS: &[(&str, f64)] = &[
    (r"/product[s]?/[\w-]+", 0.95),
    (r"/p/[\w-]+", 0.95),
    (r"/dp/", 0.95),
    (r"/item/[\w-]+", 0.95),
    (r"/-i-[\w-]+", 0.95),
    (r"/pd/[\w-]+", 0.8),
    (r"/[\w-]+-p-[\d]+", 0.8),
    (r"/shop/[\w-]+", 0.6),
    (r"/[\w-]+-[\d]+\.html", 0.6),
];

const GENERIC_CONTENT_PATTERNS: &[(&str, f64)] = &[
    (r"Add to (?:Cart|Basket)", 0.8),
    (r"Product Description", 0.7),
    (r"Buy Now", 0.7),
    (r"Add to Wishlist", 0.6),
    (r"Specifications", 0.6),
    (r"Technical Details", 0.6),
    (r"Price", 0.5),
    (r"SKU|Item Code", 0.5),
];

const AMAZON_URL_PATTERNS: &[(&str, f64)] = &[
    (r"/dp/[A-Z0-9]{10}", 0.95),
    (r"/gp/product/[A-Z0-9]{10}", 0.95),
    (r"/[A-Za-z0-9-]+/dp/[A-Z0-9]{10}", 0.95),
];

const AMAZON_CONTENT_SELECTORS: &[(&str, f64)] = &[
    ("#productTitle", 0.9),
    ("#priceblock_ourprice", 0.8),
    ("#buy-now-button", 0.8),
    ("#add-to-cart-button", 0.8),
    ("#breadcrumb-back-link", 0.7),
];

const GLOBAL_EXCLUDED_PATHS: &[&str] = &[
    "/stories",
    "/payments",
    "/about-us",
    "/contact-us",
    "/help",
    "/footer",
    "/policy",
    "/terms",
    "/careers",
    "/blog",
];

const NON_PRODUCT_PATH: &str =
    r"(facebook|twitter|instagram|linkedin|youtube|help|support|contact|about|privacy|terms|stories)";

const GLOBAL_EXCLUDED_URL_PARTS: &[&str] = &[
    "/signin",
    "/login",
    "/cart",
    "customer-preferences",
    "/language",
    "/currency",
];

const AMAZON_EXCLUDED: &[&str] = &[
    "/minitv",
    "advertising.amazon",
    "brandservices.amazon",
    "accelerator.amazon",
    "aboutamazon",
    "/s/",
    "/b/",
    "/hz/",
    "/gp/help",
    "/gp/css",
    "/gp/cart",
    "/gp/registry",
    "/ap/",
    "/stores/",
    "/music/",
    "/prime",
    "/deals",
    "/gift-cards",
    "/gcx/",
    "/services",
    "/business",
    "/musical-instruments",
];

const FLIPKART_EXCLUDED: &[&str] = &[
    "/q/",
    "gift-card-store",
    "/returnpolicy",
    "/helpcentre",
    "/payments",
    "/paymentsecurity",
    "/shipping",
    "/terms",
    "/plus",
    "/wishlist",
];

const PRODUCT_CONTAINERS: &[&str] = &["[data-product]", ".product", r#"[class*="product"]"#, "#products"];

const CAPTCHA_SELECTORS: &[&str] = &[
    "#captchacharacters",
    r#"form[action*="validateCaptcha"]"#,
    r#"input[name="amzn-captcha-verify"]"#,
];

const CAPTCHA_PHRASES: &[&str] = &[
    "Enter the characters you see below",
    "Type the characters you see in this image",
];

const CAPTCHA_RESOLVED: &[&str] = &["#nav-main", "#navbar"];

const LOAD_MORE_VOCABULARY: &[&str] = &[
    "load more",
    "show more",
    "view more",
    "load products",
    "next page",
    "more items",
    "more products",
];

/// Built-in exclusion rules.
pub fn exclusions() -> Result<ExclusionRuleSet> {
    let mut set = ExclusionRuleSet::new();

    for path in GLOBAL_EXCLUDED_PATHS {
        set.add(ExclusionRule::path_contains(
            &format!("path:{path}"),
            path,
            Applicability::Generic,
        ));
    }

    set.add(ExclusionRule {
        id: "non-product-path".to_string(),
        matcher: Matcher::regex("non-product-path", NON_PRODUCT_PATH)?,
        target: MatchTarget::Path,
        applies_to: Applicability::Generic,
    });

    for part in GLOBAL_EXCLUDED_URL_PARTS {
        set.add(ExclusionRule::url_contains(
            &format!("url:{part}"),
            part,
            Applicability::Generic,
        ));
    }

    for (label, parts) in [("amazon", AMAZON_EXCLUDED), ("flipkart", FLIPKART_EXCLUDED)] {
        for part in parts {
            set.add(ExclusionRule::url_contains(
                &format!("{label}:{part}"),
                part,
                Applicability::Domain(label.to_string()),
            ));
        }
    }

    Ok(set)
}

/// Built-in classification and fast-path tables.
pub fn patterns() -> Result<PatternRegistry> {
    let mut registry = PatternRegistry::new();

    for (re, weight) in GENERIC_URL_PATTERNS {
        registry.add(regex_pattern("url", re, *weight, PatternScope::Url, Applicability::Generic)?);
    }
    for (re, weight) in GENERIC_CONTENT_PATTERNS {
        registry.add(regex_pattern(
            "content",
            re,
            *weight,
            PatternScope::Content,
            Applicability::Generic,
        )?);
    }
    registry.add(regex_pattern(
        "structured-data",
        "^Product$",
        1.0,
        PatternScope::StructuredData,
        Applicability::Generic,
    )?);

    let amazon = Applicability::Domain("amazon".to_string());
    for (re, weight) in AMAZON_URL_PATTERNS {
        registry.add(regex_pattern("amazon-url", re, *weight, PatternScope::Url, amazon.clone())?);
        registry.add_fast_path(regex_pattern(
            "amazon-fast-path",
            re,
            *weight,
            PatternScope::Url,
            amazon.clone(),
        )?)?;
    }
    for (selector, weight) in AMAZON_CONTENT_SELECTORS {
        let id = format!("amazon-content:{selector}");
        registry.add(ClassificationPattern::new(
            &id,
            Matcher::selector(&id, selector)?,
            *weight,
            PatternScope::Content,
            amazon.clone(),
        )?);
    }

    Ok(registry)
}

/// Built-in marker tables.
pub fn markers() -> Result<Markers> {
    let selectors = |list: &[&str]| -> Vec<Marker> {
        list.iter().map(|s| Marker::Selector((*s).to_string())).collect()
    };

    let mut captcha = selectors(CAPTCHA_SELECTORS);
    captcha.extend(CAPTCHA_PHRASES.iter().map(|p| Marker::Text((*p).to_string())));

    Ok(Markers {
        product_containers: MarkerTable::new("product-containers", selectors(PRODUCT_CONTAINERS))?,
        captcha: MarkerTable::new("captcha", captcha)?,
        captcha_resolved: MarkerTable::new("captcha-resolved", selectors(CAPTCHA_RESOLVED))?,
        load_more: LOAD_MORE_VOCABULARY.iter().map(|s| (*s).to_string()).collect(),
    })
}

fn regex_pattern(
    prefix: &str,
    re: &str,
    weight: f64,
    scope: PatternScope,
    applies_to: Applicability,
) -> Result<ClassificationPattern> {
    let id = format!("{prefix}:{re}");
    ClassificationPattern::new(&id, Matcher::regex(&id, re)?, weight, scope, applies_to)
}
