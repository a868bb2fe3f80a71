use serde::Deserialize;

use crate::service::FoodCandidate;

/// Fields requested from the search endpoint.
pub const SEARCH_FIELDS: &str = "product_name,product_name_fr,brands,code";
pub const SEARCH_PAGE_SIZE: usize = 8;

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub products: Vec<ProductData>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductData {
    pub product_name: Option<String>,
    pub product_name_fr: Option<String>,
    pub brands: Option<String>,
    pub code: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// French name first, then the default one. Nameless products are skipped.
#[must_use]
pub fn product_to_candidate(p: ProductData) -> Option<FoodCandidate> {
    let name = non_blank(p.product_name_fr).or_else(|| non_blank(p.product_name))?;
    Some(FoodCandidate {
        name,
        brand: non_blank(p.brands),
        external_id: non_blank(p.code),
    })
}

#[must_use]
pub fn response_to_candidates(response: SearchResponse) -> Vec<FoodCandidate> {
    response
        .products
        .into_iter()
        .filter_map(product_to_candidate)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_product() -> ProductData {
        ProductData {
            product_name: Some("Hazelnut spread".to_string()),
            product_name_fr: Some("Pâte à tartiner".to_string()),
            brands: Some("Ferrero".to_string()),
            code: Some("3017620422003".to_string()),
        }
    }

    #[test]
    fn test_prefers_french_name() {
        let food = product_to_candidate(full_product()).unwrap();
        assert_eq!(food.name, "Pâte à tartiner");
        assert_eq!(food.brand.as_deref(), Some("Ferrero"));
        assert_eq!(food.external_id.as_deref(), Some("3017620422003"));
    }

    #[test]
    fn test_falls_back_to_default_name() {
        let mut p = full_product();
        p.product_name_fr = Some("  ".to_string());
        assert_eq!(product_to_candidate(p).unwrap().name, "Hazelnut spread");
    }

    #[test]
    fn test_nameless_product_is_skipped() {
        let p = ProductData {
            code: Some("123".to_string()),
            ..ProductData::default()
        };
        assert!(product_to_candidate(p).is_none());
    }

    #[test]
    fn test_parse_search_response() {
        let response: SearchResponse = serde_json::from_str(
            r#"{"count": 2, "products": [
                {"product_name": "Rice cakes", "brands": "", "code": "42"},
                {"brands": "Nobody"}
            ]}"#,
        )
        .unwrap();
        let candidates = response_to_candidates(response);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "Rice cakes");
        assert!(candidates[0].brand.is_none());

        let empty: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(response_to_candidates(empty).is_empty());
    }
}
