use std::io::{self, IsTerminal, Write};

use chrono::Local;
use tavola_shared::{MenuItemDto, RestaurantDto, TableDto, TableStatus};
use unicode_width::UnicodeWidthStr;

use crate::notify::{Level, Notification};
use crate::screens::restaurants::RestaurantCounts;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    /// Colors only when stdout is a terminal.
    pub fn detect() -> Self {
        Self::new(io::stdout().is_terminal())
    }

    pub fn new(color: bool) -> Self {
        Self { color }
    }

    #[tracing::instrument(skip(self, out, items))]
    pub fn print_menu<W: Write>(&self, out: &mut W, items: &[MenuItemDto]) -> anyhow::Result<()> {
        let headers = ["ID", "Name", "Category", "Price", "Available", "Dietary"];
        let rows = items
            .iter()
            .map(|item| {
                let mut name = item.name.clone();
                if item.chef_special {
                    name.push_str(" *");
                }
                let available = if item.available {
                    self.paint("yes", "32")
                } else {
                    self.paint("no", "31")
                };
                vec![
                    self.paint(&item.id.to_string(), "33"),
                    name,
                    item.category.clone(),
                    format!("{:.2}", item.price),
                    available,
                    item.dietary.clone().unwrap_or_default(),
                ]
            })
            .collect();

        write_table(out, &headers, rows)
    }

    #[tracing::instrument(skip(self, out, tables))]
    pub fn print_tables<W: Write>(
        &self,
        out: &mut W,
        tables: &[TableDto],
        asset_host: &str,
    ) -> anyhow::Result<()> {
        let headers = ["ID", "Table", "Guests", "Type", "Status", "Photos", "Thumbnail"];
        let rows = tables
            .iter()
            .map(|table| {
                vec![
                    self.paint(&table.id.to_string(), "33"),
                    table.table_number.to_string(),
                    table.capacity.to_string(),
                    table.kind.clone(),
                    self.paint_status(&table.status),
                    table.photo_count().to_string(),
                    table.thumbnail_url(asset_host),
                ]
            })
            .collect();

        write_table(&mut *out, &headers, rows)?;

        for table in tables.iter().filter(|t| !t.images.is_empty()) {
            writeln!(out)?;
            writeln!(out, "Table {} photos", table.table_number)?;
            let rows = table
                .images
                .iter()
                .map(|image| {
                    let created = image
                        .created_at_utc()
                        .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_default();
                    vec![
                        image.id.to_string(),
                        if image.is_primary { "*".to_string() } else { String::new() },
                        image.path.clone(),
                        created,
                    ]
                })
                .collect();
            write_table(&mut *out, &["Image", "Primary", "Path", "Added"], rows)?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, out, restaurants))]
    pub fn print_restaurants<W: Write>(
        &self,
        out: &mut W,
        restaurants: &[RestaurantDto],
        counts: RestaurantCounts,
    ) -> anyhow::Result<()> {
        let headers = ["ID", "Name", "Cuisine", "Admin", "Rating", "Orders", "Status"];
        let rows = restaurants
            .iter()
            .map(|r| {
                vec![
                    self.paint(&r.id.to_string(), "33"),
                    r.name.clone(),
                    r.cuisine.clone(),
                    r.admin_id.clone(),
                    format!("{:.1}", r.rating),
                    r.total_orders.map(|n| n.to_string()).unwrap_or_default(),
                    self.paint_active(r.is_active),
                ]
            })
            .collect();

        write_table(&mut *out, &headers, rows)?;
        writeln!(
            out,
            "{} restaurants, {} active, {} inactive",
            counts.total, counts.active, counts.inactive
        )?;
        Ok(())
    }

    #[tracing::instrument(skip(self, out, restaurant))]
    pub fn print_restaurant_info<W: Write>(
        &self,
        out: &mut W,
        restaurant: &RestaurantDto,
    ) -> anyhow::Result<()> {
        writeln!(out, "id        {}", restaurant.id)?;
        writeln!(out, "name      {}", restaurant.name)?;
        writeln!(out, "cuisine   {}", restaurant.cuisine)?;
        writeln!(out, "address   {}", restaurant.address)?;
        writeln!(out, "phone     {}", restaurant.phone)?;
        writeln!(out, "admin     {}", restaurant.admin_id)?;
        writeln!(out, "rating    {:.1}", restaurant.rating)?;
        writeln!(out, "status    {}", self.paint_active(restaurant.is_active))?;
        if let Some(orders) = restaurant.total_orders {
            writeln!(out, "orders    {orders}")?;
        }
        if let Some(revenue) = restaurant.revenue {
            writeln!(out, "revenue   {revenue:.2}")?;
        }
        if let Some(description) = restaurant.description.as_deref().filter(|d| !d.is_empty()) {
            writeln!(out, "about     {description}")?;
        }
        Ok(())
    }

    pub fn print_lines<W: Write>(&self, out: &mut W, lines: &[String]) -> anyhow::Result<()> {
        for line in lines {
            writeln!(out, "{line}")?;
        }
        Ok(())
    }

    /// Notices go to stderr so list output stays pipeable.
    pub fn print_notifications<W: Write>(
        &self,
        out: &mut W,
        notifications: &[Notification],
    ) -> anyhow::Result<()> {
        for notice in notifications {
            let line = match notice.level {
                Level::Success => self.paint(&notice.message, "32"),
                Level::Error => self.paint(&format!("error: {}", notice.message), "31"),
            };
            writeln!(out, "{line}")?;
        }
        Ok(())
    }

    fn paint_status(&self, status: &TableStatus) -> String {
        let code = match status {
            TableStatus::Available => "32",
            TableStatus::Reserved => "33",
            TableStatus::Occupied => "31",
            TableStatus::Unknown => "37",
        };
        self.paint(status.as_str(), code)
    }

    fn paint_active(&self, active: bool) -> String {
        if active {
            self.paint("active", "32")
        } else {
            self.paint("inactive", "31")
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: &[&str],
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(*header));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (idx, header) in headers.iter().enumerate() {
        write!(writer, "{:width$} ", header, width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn columns_pad_by_display_width() {
        let items: Vec<MenuItemDto> = serde_json::from_value(json!([
            { "id": 1, "name": "ラーメン", "category": "Noodles", "price": 12.5 },
            { "id": 22, "name": "Gyoza", "category": "Starters", "price": 6, "chef_special": true }
        ]))
        .unwrap();

        let mut out = Vec::new();
        Renderer::new(false).print_menu(&mut out, &items).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[2].starts_with("1  ラーメン Noodles  12.50"));
        assert!(lines[3].starts_with("22 Gyoza *"));
    }

    #[test]
    fn color_codes_do_not_count_toward_width() {
        assert_eq!(strip_ansi("\x1b[32mactive\x1b[0m"), "active");
        let renderer = Renderer::new(true);
        assert_eq!(renderer.paint_active(false), "\x1b[31minactive\x1b[0m");
    }

    #[test]
    fn restaurant_summary_line() {
        let restaurants: Vec<RestaurantDto> = serde_json::from_value(json!([
            { "id": 1, "name": "Sakura", "is_active": true },
            { "id": 2, "name": "Olive", "is_active": false }
        ]))
        .unwrap();
        let counts = RestaurantCounts { total: 2, active: 1, inactive: 1 };

        let mut out = Vec::new();
        Renderer::new(false)
            .print_restaurants(&mut out, &restaurants, counts)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with("2 restaurants, 1 active, 1 inactive\n"));
    }
}
