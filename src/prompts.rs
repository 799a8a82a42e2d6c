//! Instruction templates sent alongside the product images.

use serde_json::json;

use crate::models::ProductDetails;

const NOT_SPECIFIED: &str = "Not specified";

pub const RECOGNITION_PROMPT: &str = "Look at the first image and identify the main product. \
Return only the full product name (including the brand, if visible), with no other words, description or punctuation.";

fn or_not_specified(value: &str) -> &str {
    let value = value.trim();
    if value.is_empty() { NOT_SPECIFIED } else { value }
}

fn price_label(price: &str) -> String {
    let price = price.trim();
    if price.is_empty() { NOT_SPECIFIED.to_string() } else { format!("R$ {price}") }
}

/// Schema the caption response must follow: three required strings.
pub fn caption_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "instagram": { "type": "STRING", "description": "Caption for Instagram" },
            "facebook": { "type": "STRING", "description": "Caption for Facebook" },
            "twitter": { "type": "STRING", "description": "Caption for Twitter/X" }
        },
        "required": ["instagram", "facebook", "twitter"]
    })
}

pub fn caption_prompt(details: &ProductDetails) -> String {
    format!(
        "You are a social media marketing specialist. Your task is to write captions for a product post on Instagram, Facebook and Twitter. The post artwork is a square image.

**Instructions:**
1. Analyze the product images.
2. Use the details below to write the captions.
3. Write one caption for EACH of the following platforms: Instagram, Facebook and Twitter.
4. **Instagram:** Aspirational tone, use emojis, short paragraphs and 3 to 5 relevant hashtags.
5. **Facebook:** A more informative tone, somewhat longer, with a clear call-to-action. Emojis are welcome.
6. **Twitter:** Very short and direct caption (respecting the character limit), with 1 to 2 main hashtags and optionally a link (use the placeholder [link]).
7. Return the answer strictly as a JSON object with the keys \"instagram\", \"facebook\" and \"twitter\", with no other text, markdown or code fences around it.

**Product Details:**
- **Name:** {name}
- **Price:** {price}
- **Target audience:** {audience}
- **Promotion/Highlight:** {promotion}
- **Art style:** {style}",
        name = or_not_specified(&details.product_name),
        price = price_label(&details.price),
        audience = or_not_specified(&details.target_audience),
        promotion = or_not_specified(&details.promotion),
        style = or_not_specified(&details.style),
    )
}

fn typography_section(details: &ProductDetails) -> Option<String> {
    let mut lines = Vec::new();
    if !details.product_name.trim().is_empty() {
        lines.push(format!("   - **Main text:** \"{}\"", details.product_name.trim()));
    }
    if !details.price.trim().is_empty() {
        lines.push(format!(
            "   - **Price:** \"R$ {}\". Give the price emphasis without overloading the artwork.",
            details.price.trim()
        ));
    }
    if !details.promotion.trim().is_empty() {
        lines.push(format!("   - **Secondary text:** \"{}\"", details.promotion.trim()));
    }
    if lines.is_empty() {
        return None;
    }
    Some(format!(
        "- **Typography:** Integrate the following texts into the artwork, styled consistently with the \"{style}\" style:
{lines}
   - **Placement:** NEVER, under any circumstance, place text over the product. The product must stay 100% visible and unobstructed. Place the texts only in empty areas of the composition.
   - **Legibility:** Use fonts and colors that guarantee excellent reading and contrast.",
        style = or_not_specified(&details.style),
        lines = lines.join("\n"),
    ))
}

const LOGO_SECTION: &str = "- **Logo:** The LAST image provided is the brand logo. Incorporate this logo into the composition.
   - **Placement:** Put it near one of the corners, subtly, and **NEVER over the product**.
   - **Integrity:** Do NOT alter the logo (colors, shape, proportions).";

pub fn visual_prompt(details: &ProductDetails, has_logo: bool) -> String {
    let mut extras: Vec<String> = Vec::new();
    if let Some(typography) = typography_section(details) {
        extras.push(typography);
    }
    if has_logo {
        extras.push(LOGO_SECTION.to_string());
    }
    let extras = if extras.is_empty() {
        "- No additional elements.".to_string()
    } else {
        extras.join("\n")
    };
    let assets = if has_logo {
        "* The first images are the **products**.\n* The last image is the **brand logo**."
    } else {
        "* All images are the **product**."
    };

    format!(
        "**Task:** Act as an art director. Create promotional artwork for a social media post (square 1:1 format) based on the images and information provided.

**Assets:**
{assets}

**Creative rules (mandatory):**

1. **Product isolation:** Cleanly and professionally isolate the main product from its original background.

2. **Scene and composition (square 1:1):**
   * Create a background scene that matches the creative style: **\"{style}\"**. The background must be graphic and complement the product, not a photo of a real place.
   * Place the isolated product so the composition is balanced and attractive. The product is the focal point and must remain fully unobstructed: nothing, neither text nor logo, may be placed over it.

3. **Additional elements:**
{extras}

4. **Final quality:** The result must be a high-quality, clean and professional image. Do not add any other logo, watermark or random text.",
        style = or_not_specified(&details.style),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details() -> ProductDetails {
        ProductDetails {
            product_name: "Tênis X".into(),
            price: "199,90".into(),
            target_audience: "corredores".into(),
            promotion: "10% off".into(),
            style: "minimalista".into(),
        }
    }

    #[test]
    fn caption_prompt_lists_platform_rules_and_details() {
        let prompt = caption_prompt(&details());
        assert!(prompt.contains("3 to 5 relevant hashtags"));
        assert!(prompt.contains("call-to-action"));
        assert!(prompt.contains("1 to 2 main hashtags"));
        assert!(prompt.contains("[link]"));
        assert!(prompt.contains("strictly as a JSON object"));
        assert!(prompt.contains("- **Name:** Tênis X"));
        assert!(prompt.contains("- **Price:** R$ 199,90"));
        assert!(prompt.contains("- **Target audience:** corredores"));
    }

    #[test]
    fn caption_prompt_marks_empty_fields() {
        let prompt = caption_prompt(&ProductDetails::default());
        assert!(prompt.contains("- **Name:** Not specified"));
        assert!(prompt.contains("- **Price:** Not specified"));
        assert!(!prompt.contains("R$"));
    }

    #[test]
    fn caption_prompt_is_deterministic() {
        assert_eq!(caption_prompt(&details()), caption_prompt(&details()));
    }

    #[test]
    fn visual_prompt_includes_typography_only_for_given_texts() {
        let prompt = visual_prompt(&details(), false);
        assert!(prompt.contains("**Main text:** \"Tênis X\""));
        assert!(prompt.contains("\"R$ 199,90\""));
        assert!(prompt.contains("**Secondary text:** \"10% off\""));
        assert!(prompt.contains("NEVER, under any circumstance, place text over the product"));

        let only_price = ProductDetails { price: "50".into(), ..Default::default() };
        let prompt = visual_prompt(&only_price, false);
        assert!(prompt.contains("**Price:**"));
        assert!(!prompt.contains("**Main text:**"));
        assert!(!prompt.contains("**Secondary text:**"));

        let prompt = visual_prompt(&ProductDetails::default(), false);
        assert!(!prompt.contains("**Typography:**"));
        assert!(prompt.contains("No additional elements"));
    }

    #[test]
    fn visual_prompt_logo_rules_only_with_logo() {
        let with_logo = visual_prompt(&details(), true);
        assert!(with_logo.contains("The LAST image provided is the brand logo"));
        assert!(with_logo.contains("near one of the corners"));
        assert!(with_logo.contains("Do NOT alter the logo"));

        let without = visual_prompt(&details(), false);
        assert!(!without.contains("brand logo"));
    }

    #[test]
    fn visual_prompt_always_protects_the_product() {
        for has_logo in [false, true] {
            let prompt = visual_prompt(&ProductDetails::default(), has_logo);
            assert!(prompt.contains("must remain fully unobstructed"));
            assert!(prompt.contains("Do not add any other logo, watermark or random text"));
            assert!(prompt.contains("square 1:1"));
        }
    }
}
