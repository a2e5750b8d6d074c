// Copyright (C) 2026 by GiGa infosystems

//! Reading & format-preserving editing of `buildpack.toml` files

use crate::dependency::{DEPENDENCIES_KEY, DecodeError, Dependency, Metadata};
use crate::order::{ORDER_KEY, Order, decode_orders};
use color_eyre::{
    Result,
    eyre::{WrapErr, eyre},
};
use std::fs;
use std::path::{Path, PathBuf};
use toml_edit::{ArrayOfTables, DocumentMut, Item, Table};

/// The key of the table holding the [`Metadata`]
pub const METADATA_KEY: &str = "metadata";

/// A `buildpack.toml` that keeps its formatting & comments when being written back
pub struct BuildpackToml {
    dirty: bool,
    path: PathBuf,
    document: DocumentMut,
    /// The same document as a plain table, for decoding
    table: toml::Table,
}

impl BuildpackToml {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let contents =
            fs::read_to_string(&path).wrap_err_with(|| format!("Failed to read {path:?}"))?;
        Self::parse(path, &contents)
    }

    fn parse(path: PathBuf, contents: &str) -> Result<Self> {
        let document = contents
            .parse::<DocumentMut>()
            .wrap_err_with(|| format!("Invalid TOML in {path:?}"))?;
        let table = contents
            .parse::<toml::Table>()
            .wrap_err_with(|| format!("Invalid TOML in {path:?}"))?;
        Ok(BuildpackToml {
            dirty: false,
            path,
            document,
            table,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    fn document(&self) -> &DocumentMut {
        &self.document
    }

    /// The `[metadata]` table (empty if missing)
    pub fn metadata(&self) -> Result<Metadata> {
        match self.table.get(METADATA_KEY) {
            None => Ok(Metadata::new()),
            Some(toml::Value::Table(metadata)) => Ok(metadata.clone()),
            Some(_) => Err(eyre!("Invalid `{METADATA_KEY}` table in {:?}", self.path)),
        }
    }

    /// The `[[order]]` entries
    pub fn orders(&self) -> Result<Vec<Order>, DecodeError> {
        decode_orders(&self.table)
    }

    fn metadata_table_mut(&mut self) -> Result<&mut Table> {
        self.dirty = true;
        let path = &self.path;
        self.document
            .as_table_mut()
            .entry(METADATA_KEY)
            .or_insert_with(toml_edit::table)
            .as_table_mut()
            .ok_or_else(|| eyre!("Invalid `{METADATA_KEY}` table in {path:?}"))
    }

    /// Replace `[[metadata.dependencies]]` with `deps`
    pub fn set_dependencies(&mut self, deps: &[Dependency]) -> Result<()> {
        let mut tables = ArrayOfTables::new();
        for dep in deps {
            tables.push(to_edit_table(dep)?);
        }

        self.metadata_table_mut()?
            .insert(DEPENDENCIES_KEY, Item::ArrayOfTables(tables));
        self.table
            .entry(METADATA_KEY)
            .or_insert(toml::Value::Table(Metadata::new()))
            .as_table_mut()
            .ok_or_else(|| eyre!("Invalid `{METADATA_KEY}` table in {:?}", self.path))?
            .insert(DEPENDENCIES_KEY.to_owned(), toml::Value::try_from(deps)?);
        Ok(())
    }

    /// Write the versions of `orders` back into the `[[order.group]]` entries, keeping the
    /// decoration of each value.
    ///
    /// `orders` has to have the shape returned by [`BuildpackToml::orders`].
    pub fn set_order_versions(&mut self, orders: &[Order]) -> Result<()> {
        let path = self.path.clone();
        let invalid = || eyre!("Invalid `{ORDER_KEY}` entries in {path:?}");

        if orders.is_empty() {
            return Ok(());
        }

        let existing = self
            .document
            .get_mut(ORDER_KEY)
            .and_then(Item::as_array_of_tables_mut)
            .ok_or_else(invalid)?;
        if existing.len() != orders.len() {
            return Err(invalid());
        }

        let mut changed = false;
        for (table, order) in existing.iter_mut().zip(orders) {
            let groups = table
                .get_mut("group")
                .and_then(Item::as_array_of_tables_mut)
                .filter(|groups| groups.len() == order.group.len())
                .ok_or_else(invalid)?;

            for (group_table, group) in groups.iter_mut().zip(&order.group) {
                let Some(toml_edit::Value::String(version)) = group_table
                    .get_mut("version")
                    .and_then(Item::as_value_mut)
                else {
                    return Err(invalid());
                };

                if version.value() != &group.version {
                    let decor = version.decor().clone();
                    *version = toml_edit::Formatted::new(group.version.clone());
                    *version.decor_mut() = decor;
                    changed = true;
                }
            }
        }

        self.dirty |= changed;
        self.table.insert(ORDER_KEY.to_owned(), toml::Value::try_from(orders)?);
        Ok(())
    }

    /// Write the file back if anything changed
    pub fn write_back(&mut self) -> Result<()> {
        if self.dirty {
            let tmp_path = self.path.with_file_name(".buildpack.toml.update");
            fs::write(&tmp_path, self.document.to_string())?;
            fs::rename(&tmp_path, &self.path)?;
            self.dirty = false;
        }

        Ok(())
    }
}

/// Convert a dependency into an editable table, rendering values inline
fn to_edit_table(dep: &Dependency) -> Result<Table> {
    let toml::Value::Table(table) = toml::Value::try_from(dep)? else {
        return Err(eyre!("Dependency `{}` isn't a table", dep.ident()));
    };

    let mut out = Table::new();
    for (key, value) in &table {
        let mut value = value
            .to_string()
            .parse::<toml_edit::Value>()
            .wrap_err_with(|| format!("Failed to convert `{key}`"))?;
        value.decor_mut().clear();
        out.insert(key, Item::Value(value));
    }
    Ok(out)
}
