//! Named-tensor checkpoints.
//!
//! A [`StateDict`] maps dotted parameter names to flat `f32` buffers plus
//! their shapes and is stored as JSON. Loading is best-effort: names missing
//! from the dict keep their current values, names the model does not know are
//! reported, and a shape disagreement is always an error.
//!
//! ## Parameter Names
//!
//! | Prefix | Parameters |
//! |--------|------------|
//! | `embeddings` | shared `1 -> E` map, or `embeddings.{i}` per component |
//! | `gru` | `input_map`, `recurrent_map` |
//! | `attention` | `query.{i}`, `key.{i}`, `gate.bias` |
//! | `predictor` | next-input regressor |
//! | `clf` | `clf.{i}` classifier layers |
//! | `gta` | `embed`, `norm.gamma`, `norm.beta`, `attend.{i}` |

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use burn::module::Param;
use burn::nn::Linear;
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{config_error, GlassError, GlassResult, IoResultExt};
use crate::model::GlassModel;

/// One stored tensor: row-major values and their shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorEntry {
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
}

impl TensorEntry {
    fn from_tensor<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Self {
        let shape = tensor.dims().to_vec();
        let values = tensor.into_data().iter::<f32>().collect();
        Self { shape, values }
    }

    fn to_tensor<B: Backend, const D: usize>(&self, device: &B::Device) -> Tensor<B, D> {
        Tensor::from_data(
            TensorData::new(self.values.clone(), self.shape.clone()),
            device,
        )
    }

    fn is_consistent(&self) -> bool {
        self.shape.iter().product::<usize>() == self.values.len()
    }
}

/// Ordered map of parameter name to tensor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDict {
    pub tensors: BTreeMap<String, TensorEntry>,
}

impl StateDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&TensorEntry> {
        self.tensors.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    pub fn insert<B: Backend, const D: usize>(&mut self, name: impl Into<String>, tensor: Tensor<B, D>) {
        self.tensors
            .insert(name.into(), TensorEntry::from_tensor(tensor));
    }

    fn insert_linear<B: Backend>(&mut self, prefix: &str, linear: &Linear<B>) {
        self.insert(format!("{prefix}.weight"), linear.weight.val());
        if let Some(ref bias) = linear.bias {
            self.insert(format!("{prefix}.bias"), bias.val());
        }
    }

    /// Drop every entry whose name contains one of `exclude`
    pub fn prune(mut self, exclude: &[String]) -> Self {
        let before = self.tensors.len();
        self.tensors
            .retain(|name, _| !exclude.iter().any(|pattern| name.contains(pattern.as_str())));
        debug!(
            dropped = before - self.tensors.len(),
            kept = self.tensors.len(),
            "Pruned state dict"
        );
        self
    }

    /// Write the dict as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> GlassResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_path(parent)?;
            }
        }
        let json = serde_json::to_string(self)?;
        fs::write(path, json).with_path(path)?;
        info!(path = %path.display(), tensors = self.len(), "Checkpoint saved");
        Ok(())
    }

    /// Read a dict written by [`StateDict::save`]
    pub fn load<P: AsRef<Path>>(path: P) -> GlassResult<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).with_path(path)?;
        let dict: StateDict = serde_json::from_str(&json).map_err(|e| GlassError::Checkpoint {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        if let Some((name, _)) = dict.tensors.iter().find(|(_, entry)| !entry.is_consistent()) {
            return Err(GlassError::Checkpoint {
                path: path.display().to_string(),
                message: format!("tensor `{name}` has a value count that does not match its shape"),
            });
        }

        Ok(dict)
    }
}

/// Outcome of [`GlassModel::load_state_dict`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Parameters overwritten from the dict
    pub loaded: Vec<String>,
    /// Parameters absent from the dict, left at their current values
    pub missing: Vec<String>,
    /// Dict entries that name no parameter of the model
    pub unexpected: Vec<String>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

struct Loader<'a> {
    dict: &'a StateDict,
    visited: BTreeSet<String>,
    report: LoadReport,
}

impl<'a> Loader<'a> {
    fn new(dict: &'a StateDict) -> Self {
        Self {
            dict,
            visited: BTreeSet::new(),
            report: LoadReport::default(),
        }
    }

    fn tensor<B: Backend, const D: usize>(
        &mut self,
        name: String,
        current: &Tensor<B, D>,
    ) -> GlassResult<Option<Tensor<B, D>>> {
        self.visited.insert(name.clone());
        let Some(entry) = self.dict.get(&name) else {
            self.report.missing.push(name);
            return Ok(None);
        };

        let expected = current.dims();
        if entry.shape != expected {
            return Err(config_error(
                name,
                format!(
                    "checkpoint shape {:?} does not match parameter shape {:?}",
                    entry.shape, expected
                ),
            ));
        }

        let tensor = entry.to_tensor(&current.device());
        self.report.loaded.push(name);
        Ok(Some(tensor))
    }

    fn param<B: Backend, const D: usize>(
        &mut self,
        name: String,
        param: Param<Tensor<B, D>>,
    ) -> GlassResult<Param<Tensor<B, D>>> {
        Ok(match self.tensor(name, &param.val())? {
            Some(tensor) => Param::from_tensor(tensor),
            None => param,
        })
    }

    fn linear<B: Backend>(&mut self, prefix: &str, mut linear: Linear<B>) -> GlassResult<Linear<B>> {
        linear.weight = self.param(format!("{prefix}.weight"), linear.weight)?;
        if let Some(bias) = linear.bias.take() {
            linear.bias = Some(self.param(format!("{prefix}.bias"), bias)?);
        }
        Ok(linear)
    }

    fn linears<B: Backend>(&mut self, prefix: &str, layers: Vec<Linear<B>>) -> GlassResult<Vec<Linear<B>>> {
        layers
            .into_iter()
            .enumerate()
            .map(|(i, layer)| self.linear(&format!("{prefix}.{i}"), layer))
            .collect()
    }

    fn finish(mut self) -> LoadReport {
        self.report.unexpected = self
            .dict
            .names()
            .filter(|name| !self.visited.contains(*name))
            .map(str::to_string)
            .collect();
        self.report
    }
}

impl<B: Backend> GlassModel<B> {
    /// Export every trainable parameter under its dotted name
    pub fn state_dict(&self) -> StateDict {
        let mut dict = StateDict::new();

        let embeddings = &self.rnn.embeddings;
        if let Some(ref shared) = embeddings.shared {
            dict.insert_linear("embeddings", shared);
        }
        for (i, layer) in embeddings.per_component.iter().enumerate() {
            dict.insert_linear(&format!("embeddings.{i}"), layer);
        }

        let gru = &self.rnn.cell.gru;
        dict.insert_linear("gru.input_map", &gru.input_map);
        dict.insert_linear("gru.recurrent_map", &gru.recurrent_map);

        let attention = &self.rnn.cell.attention;
        for (i, layer) in attention.query.layers.iter().enumerate() {
            dict.insert_linear(&format!("attention.query.{i}"), layer);
        }
        for (i, layer) in attention.key.layers.iter().enumerate() {
            dict.insert_linear(&format!("attention.key.{i}"), layer);
        }
        if let Some(ref gate) = attention.gate {
            dict.insert("attention.gate.bias", gate.bias.val());
        }

        dict.insert_linear("predictor", &self.predictor);

        for (i, layer) in self.head.clf.layers.iter().enumerate() {
            dict.insert_linear(&format!("clf.{i}"), layer);
        }
        if let Some(ref gta) = self.head.gta {
            dict.insert_linear("gta.embed", &gta.embed);
            dict.insert("gta.norm.gamma", gta.norm.gamma.val());
            dict.insert("gta.norm.beta", gta.norm.beta.val());
            for (i, layer) in gta.attend.iter().enumerate() {
                dict.insert_linear(&format!("gta.attend.{i}"), layer);
            }
        }

        dict
    }

    /// Save [`GlassModel::state_dict`] to `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> GlassResult<()> {
        self.state_dict().save(path)
    }

    /// Overwrite parameters from `dict`.
    ///
    /// Every name the dict shares with the model must agree in shape. With
    /// `strict` off, names on either side without a counterpart are only
    /// reported; with `strict` on they fail the load.
    pub fn load_state_dict(mut self, dict: &StateDict, strict: bool) -> GlassResult<(Self, LoadReport)> {
        let mut loader = Loader::new(dict);

        let embeddings = &mut self.rnn.embeddings;
        if let Some(shared) = embeddings.shared.take() {
            embeddings.shared = Some(loader.linear("embeddings", shared)?);
        }
        let per_component = std::mem::take(&mut embeddings.per_component);
        embeddings.per_component = loader.linears("embeddings", per_component)?;

        let gru = &mut self.rnn.cell.gru;
        gru.input_map = loader.linear("gru.input_map", gru.input_map.clone())?;
        gru.recurrent_map = loader.linear("gru.recurrent_map", gru.recurrent_map.clone())?;

        let attention = &mut self.rnn.cell.attention;
        let query = std::mem::take(&mut attention.query.layers);
        attention.query.layers = loader.linears("attention.query", query)?;
        let key = std::mem::take(&mut attention.key.layers);
        attention.key.layers = loader.linears("attention.key", key)?;
        if let Some(ref mut gate) = attention.gate {
            gate.bias = loader.param("attention.gate.bias".to_string(), gate.bias.clone())?;
        }

        self.predictor = loader.linear("predictor", self.predictor.clone())?;

        let clf = std::mem::take(&mut self.head.clf.layers);
        self.head.clf.layers = loader.linears("clf", clf)?;
        if let Some(ref mut gta) = self.head.gta {
            gta.embed = loader.linear("gta.embed", gta.embed.clone())?;
            gta.norm.gamma = loader.param("gta.norm.gamma".to_string(), gta.norm.gamma.clone())?;
            gta.norm.beta = loader.param("gta.norm.beta".to_string(), gta.norm.beta.clone())?;
            let attend = std::mem::take(&mut gta.attend);
            gta.attend = loader.linears("gta.attend", attend)?;
        }

        let report = loader.finish();
        if !report.unexpected.is_empty() || !report.missing.is_empty() {
            warn!(
                missing = ?report.missing,
                unexpected = ?report.unexpected,
                "State dict does not cover the model exactly"
            );
        }
        if strict && !report.is_complete() {
            return Err(GlassError::Checkpoint {
                path: "<state dict>".to_string(),
                message: format!(
                    "strict load failed: {} missing, {} unexpected",
                    report.missing.len(),
                    report.unexpected.len()
                ),
            });
        }

        Ok((self, report))
    }
}
