use rust_decimal::Decimal;

use crate::domain::catalog::{
    Category, ProductOption, COLOR_CATEGORY, GLASS_CATEGORY, MATERIAL_CATEGORY, OPENING_CATEGORY,
};

fn price(units: i64) -> Decimal {
    Decimal::from(units)
}

/// Multiplier expressed in hundredths, e.g. `115` is 1.15.
fn multiplier(hundredths: i64) -> Decimal {
    Decimal::new(hundredths, 2)
}

/// The built-in catalog seeded at session start and restored by a reset.
pub fn default_categories() -> Vec<Category> {
    vec![
        Category::new(
            MATERIAL_CATEGORY,
            "Materiale Profilo",
            "Scegli il materiale principale per la struttura",
        )
        .with_options(vec![
            ProductOption::new(
                "pvc",
                "PVC Premium",
                "Eccellente isolamento termico, economico e durevole.",
                price(150),
                multiplier(100),
            ),
            ProductOption::new(
                "wood",
                "Legno Lamellare",
                "Eleganza naturale, perfetto per ambienti classici.",
                price(280),
                multiplier(120),
            ),
            ProductOption::new(
                "alu",
                "Alluminio Taglio Termico",
                "Minimalista, resistente e moderno. Massima luce.",
                price(350),
                multiplier(115),
            ),
            ProductOption::new(
                "alu-wood",
                "Legno / Alluminio",
                "Il calore del legno dentro, la resistenza dell'alluminio fuori.",
                price(450),
                multiplier(130),
            ),
        ]),
        Category::new(OPENING_CATEGORY, "Tipologia Apertura", "Come si deve aprire la tua finestra?")
            .with_options(vec![
                ProductOption::new(
                    "fixed",
                    "Fisso",
                    "Non apribile. Ideale per vetrine o punti luce.",
                    price(0),
                    multiplier(80),
                ),
                ProductOption::new(
                    "battente",
                    "Anta a Battente",
                    "Apertura classica interna.",
                    price(50),
                    multiplier(100),
                ),
                ProductOption::new(
                    "vasistas",
                    "Vasistas / Ribalta",
                    "Apertura superiore per areazione controllata.",
                    price(80),
                    multiplier(110),
                ),
                ProductOption::new(
                    "scorrevole",
                    "Scorrevole",
                    "Salvaspazio, ideale per grandi vetrate.",
                    price(200),
                    multiplier(150),
                ),
            ]),
        Category::new(GLASS_CATEGORY, "Vetrata", "Scegli le performance del vetro").with_options(
            vec![
                ProductOption::new(
                    "double",
                    "Doppio Vetro Standard",
                    "Camera d'aria standard (Ug 1.1).",
                    price(50),
                    multiplier(100),
                ),
                ProductOption::new(
                    "triple",
                    "Triplo Vetro",
                    "Massimo isolamento termico (Ug 0.6).",
                    price(120),
                    multiplier(120),
                ),
                ProductOption::new(
                    "acoustic",
                    "Vetro Acustico",
                    "Ideale per zone trafficate e rumorose.",
                    price(100),
                    multiplier(110),
                ),
            ],
        ),
        Category::new(COLOR_CATEGORY, "Finitura e Colore", "L'estetica conta").with_options(vec![
            ProductOption::new(
                "white",
                "Bianco Massa",
                "Standard, pulito e luminoso.",
                price(0),
                multiplier(100),
            ),
            ProductOption::new(
                "anthracite",
                "Grigio Antracite",
                "Moderno ed elegante, effetto satinato.",
                price(30),
                multiplier(105),
            ),
            ProductOption::new(
                "oak",
                "Effetto Quercia",
                "Pellicola effetto legno naturale.",
                price(50),
                multiplier(110),
            ),
        ]),
    ]
}
