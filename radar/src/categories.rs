/// Static category catalog for category-mode search. Free-form terms still
/// pass through to the provider; this list only feeds the dashboard picker.
/// Kept sorted.
pub const CATALOG: &[&str] = &[
    "ATM",
    "Auto parts store",
    "Bakery",
    "Bank",
    "Bar",
    "Barbecue restaurant",
    "Beauty salon",
    "Bookstore",
    "Brewery",
    "Burger restaurant",
    "Butcher shop",
    "Cafe",
    "Campground",
    "Car dealer",
    "Car rental",
    "Car wash",
    "Casino",
    "Chinese restaurant",
    "Chocolate shop",
    "Clothing store",
    "Cocktail bar",
    "Convenience store",
    "Coworking space",
    "Dental clinic",
    "Electronics store",
    "Fast food restaurant",
    "Fish market",
    "Florist",
    "Furniture store",
    "Gas station",
    "Gift shop",
    "Greengrocer",
    "Grocery store",
    "Gym",
    "Hair salon",
    "Hardware store",
    "Hospital",
    "Hostel",
    "Hotel",
    "Ice cream shop",
    "Internet cafe",
    "Italian restaurant",
    "Japanese restaurant",
    "Law firm",
    "Library",
    "Liquor store",
    "Luxury hotel",
    "Mexican restaurant",
    "Motel",
    "Movie theater",
    "Night club",
    "Pastry shop",
    "Pet store",
    "Pharmacy",
    "Pizza restaurant",
    "Real estate agency",
    "Restaurant",
    "School",
    "Shoe store",
    "Shopping mall",
    "Spa",
    "Sporting goods store",
    "Steakhouse",
    "Supermarket",
    "Toy store",
    "Travel agency",
    "Vegetarian restaurant",
    "Veterinarian",
    "Wine shop",
    "Yoga studio",
];

pub fn catalog() -> &'static [&'static str] {
    CATALOG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_is_sorted_and_deduped() {
        let mut sorted = CATALOG.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted, CATALOG);
    }
}
